//! Typed view over a [`KvStore`](clcache_kv::KvStore) exposing the cache's
//! monotonic counters and size/entry gauges.
//!
//! Backed by an enum-indexed set of named counters so the on-disk key
//! strings can't be typo'd past compile time. Resetting zeroes every
//! counter but never touches the two gauges (`CacheEntries`, `CacheSize`),
//! which are reconciled only by eviction.

#![warn(missing_docs)]

use std::path::Path;

use clcache_kv::{KvError, KvStore};

const FILE_NAME: &str = "stats.txt";

/// Why a compile was not served from cache.
///
/// `Plain` has no dedicated on-disk counter — spec.md's invariant
/// `CacheMisses == EvictedMisses + HeaderChangedMisses + SourceChangedMisses
/// + plainMisses` treats the plain-miss count as derived, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// No more specific reason applies.
    Plain,
    /// The manifest pointed at an object-store entry evicted since.
    Evicted,
    /// A manifest entry's header content no longer matches.
    HeaderChanged,
    /// No manifest existed for this source at all.
    SourceChanged,
}

/// Why the classifier rejected an invocation outright (no fingerprinting
/// was attempted at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The argument list could not be parsed.
    InvalidArgument,
    /// No source file was found in the argument list.
    NoSource,
    /// More than one source file was given without per-file language tags.
    MultipleSources,
    /// The invocation builds or consumes a precompiled header.
    Pch,
    /// The invocation is a link step, not a compile.
    Linking,
    /// The invocation produces externally-referenced debug info.
    ExternalDebugInfo,
    /// The invocation is preprocessor-only.
    Preprocessing,
}

/// The full set of monotonic counter names persisted in `stats.txt`.
const COUNTER_KEYS: &[&str] = &[
    "CacheHits",
    "CacheMisses",
    "EvictedMisses",
    "HeaderChangedMisses",
    "SourceChangedMisses",
    "CallsWithInvalidArgument",
    "CallsWithNoSource",
    "CallsWithMultipleSources",
    "CallsWithPch",
    "CallsForLinking",
    "CallsForExternalDebugInfo",
    "CallsForPreprocessing",
];

const KEY_CACHE_ENTRIES: &str = "CacheEntries";
const KEY_CACHE_SIZE: &str = "CacheSize";

/// Typed statistics document for the cache.
pub struct Statistics {
    kv: KvStore,
}

impl Statistics {
    /// Opens `<cache_dir>/stats.txt`.
    pub fn open(cache_dir: &Path) -> Self {
        Self {
            kv: KvStore::open(cache_dir.join(FILE_NAME)),
        }
    }

    fn increment(&mut self, key: &str) {
        let current = self.kv.get_u64(key);
        self.kv.set(key, current + 1);
    }

    /// Reads a named counter, defaulting to 0.
    pub fn counter(&self, key: &str) -> u64 {
        self.kv.get_u64(key)
    }

    /// Records a cache hit.
    pub fn record_hit(&mut self) {
        self.increment("CacheHits");
    }

    /// Records a cache miss for the given reason. Always increments
    /// `CacheMisses`; additionally increments the reason-specific counter
    /// when one exists.
    pub fn record_miss(&mut self, reason: MissReason) {
        self.increment("CacheMisses");
        match reason {
            MissReason::Plain => {}
            MissReason::Evicted => self.increment("EvictedMisses"),
            MissReason::HeaderChanged => self.increment("HeaderChangedMisses"),
            MissReason::SourceChanged => self.increment("SourceChangedMisses"),
        }
    }

    /// Records that an invocation was rejected by the classifier before
    /// fingerprinting was attempted.
    pub fn record_rejection(&mut self, reason: RejectionReason) {
        let key = match reason {
            RejectionReason::InvalidArgument => "CallsWithInvalidArgument",
            RejectionReason::NoSource => "CallsWithNoSource",
            RejectionReason::MultipleSources => "CallsWithMultipleSources",
            RejectionReason::Pch => "CallsWithPch",
            RejectionReason::Linking => "CallsForLinking",
            RejectionReason::ExternalDebugInfo => "CallsForExternalDebugInfo",
            RejectionReason::Preprocessing => "CallsForPreprocessing",
        };
        self.increment(key);
    }

    /// The non-resettable cache-entry-count gauge.
    pub fn cache_entries(&self) -> u64 {
        self.kv.get_u64(KEY_CACHE_ENTRIES)
    }

    /// Sets the cache-entry-count gauge (eviction reconciliation only).
    pub fn set_cache_entries(&mut self, count: u64) {
        self.kv.set(KEY_CACHE_ENTRIES, count);
    }

    /// The non-resettable cache-size-in-bytes gauge.
    pub fn cache_size(&self) -> u64 {
        self.kv.get_u64(KEY_CACHE_SIZE)
    }

    /// Sets the cache-size gauge (eviction reconciliation only).
    pub fn set_cache_size(&mut self, bytes: u64) {
        self.kv.set(KEY_CACHE_SIZE, bytes);
    }

    /// Zeroes every counter. Gauges (`CacheEntries`, `CacheSize`) are left
    /// untouched — they reflect on-disk reality, not activity history.
    pub fn reset_counters(&mut self) {
        for key in COUNTER_KEYS {
            self.kv.set(*key, 0u64);
        }
    }

    /// Persists changes, if any.
    pub fn save(&self) -> Result<(), KvError> {
        self.kv.save()
    }
}
