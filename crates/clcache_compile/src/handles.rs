//! The per-invocation bundle of store/fingerprint/statistics handles the
//! compile pipeline threads through every job.

use std::path::{Path, PathBuf};

use clcache_config::Configuration;
use clcache_digest::{FileHasher, NullRemoteHasher, RemoteHasher};
use clcache_fingerprint::MANIFEST_FORMAT_VERSION;
use clcache_lock::Lock;
use clcache_stats::{MissReason, Statistics};
use clcache_store::{CopyOptions, ManifestStore, ObjectStore};

use crate::error::CompileError;

/// Everything one worker needs to run the compile pipeline against a
/// shared cache directory. Cheap to share across worker threads behind an
/// `Arc` — the stores themselves take no lock until an operation on a
/// specific key or the statistics document is performed.
pub struct CacheHandles<R: RemoteHasher = NullRemoteHasher> {
    cache_dir: PathBuf,
    /// The content-addressed object store.
    pub objects: ObjectStore,
    /// The manifest store.
    pub manifests: ManifestStore,
    /// The per-invocation file hasher (memoized, optionally remote-backed).
    pub hasher: FileHasher<R>,
    /// Hard-link/compression settings for object copy-in/copy-out.
    pub copy_opts: CopyOptions,
    /// The manifest format version mixed into every manifest hash.
    pub manifest_version: u32,
    stats_lock: Lock,
}

impl CacheHandles<NullRemoteHasher> {
    /// Opens the cache at `cache_dir` with local-only hashing.
    pub fn new(cache_dir: &Path) -> Self {
        Self::with_hasher(cache_dir, FileHasher::local())
    }
}

impl<R: RemoteHasher> CacheHandles<R> {
    /// Opens the cache at `cache_dir` with a caller-supplied hasher
    /// (typically [`FileHasher::local`] or one wired to a remote back end).
    pub fn with_hasher(cache_dir: &Path, hasher: FileHasher<R>) -> Self {
        Self {
            objects: ObjectStore::new(cache_dir),
            manifests: ManifestStore::new(cache_dir),
            hasher,
            copy_opts: CopyOptions::default(),
            manifest_version: MANIFEST_FORMAT_VERSION,
            stats_lock: Lock::new(cache_dir, "stats"),
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// The cache root directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Runs `f` with the statistics and configuration documents open,
    /// under the statistics lock, saving statistics afterward. Per the
    /// lock hierarchy, configuration is read only while this lock is held.
    pub fn with_stats<T>(
        &self,
        f: impl FnOnce(&mut Statistics, &mut Configuration) -> T,
    ) -> Result<T, CompileError> {
        let _guard = self.stats_lock.acquire()?;
        let mut stats = Statistics::open(&self.cache_dir);
        let mut config = Configuration::open(&self.cache_dir);
        let result = f(&mut stats, &mut config);
        stats.save()?;
        Ok(result)
    }

    /// Convenience wrapper recording a hit under the statistics lock.
    pub fn record_hit(&self) -> Result<(), CompileError> {
        self.with_stats(|stats, _config| stats.record_hit())
    }

    /// Convenience wrapper recording a miss under the statistics lock.
    pub fn record_miss(&self, reason: MissReason) -> Result<(), CompileError> {
        self.with_stats(|stats, _config| stats.record_miss(reason))
    }
}
