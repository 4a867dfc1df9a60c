//! Size-bounded eviction across the manifest and object stores.

use std::path::PathBuf;
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::error::StoreError;
use crate::manifest::ManifestStore;
use crate::object::ObjectStore;

/// Gauge values to reconcile statistics with after an eviction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionResult {
    /// Total bytes occupied by surviving objects and manifests.
    pub cache_size: u64,
    /// Surviving object-store entry count.
    pub cache_entries: u64,
}

struct Candidate {
    path: PathBuf,
    atime: SystemTime,
    size: u64,
}

fn atime_or_epoch(metadata: &std::fs::Metadata) -> SystemTime {
    metadata.accessed().unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Walks `root`'s immediate two-hex-character shard directories and returns
/// one [`Candidate`] per manifest file (`root/<hh>/<hash>.json`).
fn manifest_candidates(root: &std::path::Path) -> Vec<Candidate> {
    WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            Some(Candidate {
                path: entry.into_path(),
                atime: atime_or_epoch(&metadata),
                size: metadata.len(),
            })
        })
        .collect()
}

/// Walks `root`'s immediate two-hex-character shard directories and returns
/// one [`Candidate`] per object entry directory (`root/<hh>/<key>/`), with
/// size summed over every file the entry directory contains.
fn object_candidates(root: &std::path::Path) -> Vec<Candidate> {
    WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            let mut size = 0u64;
            let mut atime = atime_or_epoch(&metadata);
            for file in WalkDir::new(entry.path())
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                if let Ok(meta) = file.metadata() {
                    size += meta.len();
                    atime = atime.max(atime_or_epoch(&meta));
                }
            }
            Some(Candidate {
                path: entry.into_path(),
                atime,
                size,
            })
        })
        .collect()
}

/// Cleans the manifest store down to `budget` bytes, keeping the
/// newest-by-atime files first. Returns the surviving cumulative size.
fn clean_manifests(store: &ManifestStore, budget: u64) -> Result<u64, StoreError> {
    let mut candidates = manifest_candidates(store.root());
    candidates.sort_by(|a, b| b.atime.cmp(&a.atime));

    let mut kept_size = 0u64;
    let mut cutoff = candidates.len();
    for (i, candidate) in candidates.iter().enumerate() {
        if kept_size + candidate.size > budget {
            cutoff = i;
            break;
        }
        kept_size += candidate.size;
    }

    for stale in &candidates[cutoff..] {
        let _ = std::fs::remove_file(&stale.path);
    }

    Ok(kept_size)
}

/// Cleans the object store down under `budget` bytes, evicting
/// oldest-by-atime entries first. Returns (remaining count, remaining
/// bytes).
fn clean_objects(store: &ObjectStore, budget: u64) -> Result<(u64, u64), StoreError> {
    let mut candidates = object_candidates(store.root());
    candidates.sort_by(|a, b| a.atime.cmp(&b.atime));

    let mut total: u64 = candidates.iter().map(|c| c.size).sum();
    let mut remaining = candidates.len();
    let mut idx = 0;
    while total >= budget && idx < candidates.len() {
        let candidate = &candidates[idx];
        if std::fs::remove_dir_all(&candidate.path).is_ok() {
            total = total.saturating_sub(candidate.size);
            remaining -= 1;
        }
        idx += 1;
    }

    Ok((remaining as u64, total))
}

/// Runs one eviction pass against `max_size`, the configured
/// `MaximumCacheSize`. Splits the 90% working budget 10/90 between
/// manifests and objects, cleans each store, and returns the reconciled
/// gauge values.
pub fn evict(
    object_store: &ObjectStore,
    manifest_store: &ManifestStore,
    max_size: u64,
) -> Result<EvictionResult, StoreError> {
    let working_budget = (max_size as f64 * 0.9) as u64;
    let manifest_budget = (working_budget as f64 * 0.1) as u64;
    let object_budget = working_budget.saturating_sub(manifest_budget);

    let manifest_size = clean_manifests(manifest_store, manifest_budget)?;
    let (object_count, object_size) = clean_objects(object_store, object_budget)?;

    Ok(EvictionResult {
        cache_size: object_size + manifest_size,
        cache_entries: object_count,
    })
}
