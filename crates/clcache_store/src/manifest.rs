//! The manifest type and its sharded on-disk store.

use std::path::{Path, PathBuf};

use clcache_digest::Digest;
use clcache_lock::Lock;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Entries beyond this count are evicted MRU-first when inserting.
pub const MAX_MANIFEST_ENTRIES: usize = 100;

/// One observed (include-set, include-content-hash, object-key) combination
/// for a given (compiler, flags, source) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Absolute header paths (basedir-collapsed), de-duplicated and sorted
    /// before hashing, stored in that sorted order.
    #[serde(rename = "includeFiles")]
    pub include_files: Vec<PathBuf>,
    /// `H(h1 "," h2 ...)` over the per-header content hashes.
    #[serde(rename = "includesContentHash")]
    pub includes_content_hash: Digest,
    /// `H(manifestHash ++ includesContentHash)`, the object-store key.
    #[serde(rename = "objectHash")]
    pub object_hash: Digest,
}

/// MRU-ordered, capped sequence of [`ManifestEntry`] for one manifest hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// An empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries, most-recently-used first.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Moves the entry at `index` to position 0, leaving the relative order
    /// of every other entry unchanged.
    pub fn touch(&mut self, index: usize) {
        if index == 0 || index >= self.entries.len() {
            return;
        }
        let entry = self.entries.remove(index);
        self.entries.insert(0, entry);
    }

    /// Inserts `entry` at position 0. If an entry with the same
    /// `object_hash` already exists it is moved to the front instead of
    /// duplicated. Otherwise the manifest is capped at
    /// [`MAX_MANIFEST_ENTRIES`], dropping the oldest (last) entry first.
    pub fn add_entry(&mut self, entry: ManifestEntry) {
        if let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.object_hash == entry.object_hash)
        {
            self.touch(pos);
            return;
        }

        self.entries.insert(0, entry);
        if self.entries.len() > MAX_MANIFEST_ENTRIES {
            self.entries.truncate(MAX_MANIFEST_ENTRIES);
        }
    }
}

/// Sharded directory of per-manifest-hash JSON documents.
pub struct ManifestStore {
    root: PathBuf,
    lock_dir: PathBuf,
}

impl ManifestStore {
    /// Opens the manifest store rooted at `<cache_dir>/manifests`.
    pub fn new(cache_dir: &Path) -> Self {
        let root = cache_dir.join("manifests");
        Self {
            lock_dir: root.join(".locks"),
            root,
        }
    }

    fn shard_dir(&self, m: &Digest) -> PathBuf {
        self.root.join(m.shard_prefix())
    }

    fn path(&self, m: &Digest) -> PathBuf {
        self.shard_dir(m).join(format!("{m}.json"))
    }

    /// The section lock guarding manifest `m`'s shard.
    pub fn lock_for(&self, m: &Digest) -> Lock {
        Lock::new(&self.lock_dir, &m.shard_prefix())
    }

    /// Reads manifest `m`. A missing or malformed file is `None`, never an
    /// error — manifests are an optimization, not a source of truth.
    pub fn get(&self, m: &Digest) -> Option<Manifest> {
        let path = self.path(m);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(manifest) => Some(manifest),
            Err(_) => {
                tracing::warn!(path = %path.display(), "malformed manifest, treating as absent");
                None
            }
        }
    }

    /// Writes manifest `m` atomically (temp file + rename).
    pub fn set(&self, m: &Digest, manifest: &Manifest) -> Result<(), StoreError> {
        let dir = self.shard_dir(m);
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = self.path(m);
        let json = serde_json::to_string_pretty(manifest).expect("Manifest always serializes");
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })
    }

    /// Removes the manifest for `m`, ignoring a missing target.
    pub fn remove(&self, m: &Digest) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path(m)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path(m),
                source,
            }),
        }
    }

    /// The store's root directory, for eviction's directory walk.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
