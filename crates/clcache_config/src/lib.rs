//! Typed view over a [`KvStore`](clcache_kv::KvStore) exposing the cache's
//! tunables.
//!
//! Deliberately thin: the cache has exactly one persisted tunable,
//! `MaximumCacheSize`, stored in `config.txt` at the cache root. Callers are
//! responsible for holding the appropriate lock (statistics lock or the
//! global cache lock) while a [`Configuration`] is open, per the hierarchy
//! in the fingerprinter/compile-pipeline crates.

#![warn(missing_docs)]

use std::path::Path;

use clcache_kv::{KvError, KvStore};

/// One gibibyte, the default maximum cache size.
pub const DEFAULT_MAXIMUM_CACHE_SIZE: u64 = 1024 * 1024 * 1024;

const KEY_MAXIMUM_CACHE_SIZE: &str = "MaximumCacheSize";
const FILE_NAME: &str = "config.txt";

/// Typed configuration document for the cache.
pub struct Configuration {
    kv: KvStore,
}

impl Configuration {
    /// Opens `<cache_dir>/config.txt`.
    pub fn open(cache_dir: &Path) -> Self {
        Self {
            kv: KvStore::open(cache_dir.join(FILE_NAME)),
        }
    }

    /// The configured maximum cache size in bytes, defaulting to 1 GiB.
    pub fn maximum_cache_size(&self) -> u64 {
        match self.kv.get(KEY_MAXIMUM_CACHE_SIZE) {
            Some(v) => v.as_u64().unwrap_or(DEFAULT_MAXIMUM_CACHE_SIZE),
            None => DEFAULT_MAXIMUM_CACHE_SIZE,
        }
    }

    /// Sets the maximum cache size in bytes.
    pub fn set_maximum_cache_size(&mut self, bytes: u64) {
        self.kv.set(KEY_MAXIMUM_CACHE_SIZE, bytes);
    }

    /// Persists changes, if any.
    pub fn save(&self) -> Result<(), KvError> {
        self.kv.save()
    }
}
