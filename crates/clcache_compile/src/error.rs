//! Errors raised by the per-source compile pipeline.

use thiserror::Error;

/// Errors that abort a compile job outright (as opposed to merely
/// preventing a cache hit, which is reported through [`crate::CompileOutcome`]).
#[derive(Debug, Error)]
pub enum CompileError {
    /// A section or statistics lock could not be acquired in time.
    #[error(transparent)]
    Lock(#[from] clcache_lock::LockError),

    /// The object or manifest store failed in a way that isn't a plain
    /// cache miss (disk write failure, corrupt entry directory).
    #[error(transparent)]
    Store(#[from] clcache_store::StoreError),

    /// Fingerprint computation failed for a reason other than a missing
    /// include during manifest probing (which is handled, not propagated).
    #[error(transparent)]
    Fingerprint(#[from] clcache_fingerprint::FingerprintError),

    /// Persisting statistics or configuration failed.
    #[error(transparent)]
    Kv(#[from] clcache_kv::KvError),

    /// Spawning or waiting on the compiler subprocess failed at the OS
    /// level (as opposed to the compiler itself returning non-zero, which
    /// is a normal, non-fatal outcome).
    #[error("failed to run compiler {compiler}: {source}")]
    Spawn {
        /// The compiler binary that could not be run.
        compiler: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
