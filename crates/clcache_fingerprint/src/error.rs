//! Errors raised computing a fingerprint.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the fingerprinting pipeline.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// The compiler binary's metadata (for `compiler_hash`) could not be read.
    #[error("failed to stat compiler at {path}: {source}")]
    CompilerMeta {
        /// The compiler binary path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A source or include file could not be hashed.
    #[error(transparent)]
    Include(#[from] clcache_digest::DigestError),
}
