//! Errors raised by the object and manifest stores.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by [`crate::ObjectStore`] and [`crate::ManifestStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A filesystem operation on the store failed.
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// The path being operated on.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Acquiring a section lock failed.
    #[error(transparent)]
    Lock(#[from] clcache_lock::LockError),

    /// `get` was called for a key that `has` says is absent.
    #[error("object entry {key} requested but not present")]
    MissingEntry {
        /// The requested key.
        key: String,
    },

    /// A copy-out found the object payload compressed when
    /// `CLCACHE_COMPRESS` was not in effect for the read, or vice versa.
    #[error("compressed/uncompressed object mismatch at {path}")]
    CompressionMismatch {
        /// The object file whose magic bytes didn't match expectations.
        path: PathBuf,
    },
}
