//! Pluggable out-of-process file-hash service.
//!
//! The protocol is intentionally trivial: the client writes newline-separated
//! absolute paths terminated by a zero byte, and the server replies with
//! either newline-separated hex digests terminated by a zero byte, or an
//! error frame beginning with `!`. A server is entirely optional — absence
//! or unavailability simply means every file is hashed locally.

use std::path::PathBuf;

use thiserror::Error;

use crate::digest::Digest;

/// Errors from a remote hasher round-trip. Callers treat all of these as
/// "fall back to local hashing", never as fatal.
#[derive(Debug, Error)]
pub enum RemoteHasherError {
    /// The remote endpoint could not be reached.
    #[error("remote hasher unreachable: {0}")]
    Unreachable(String),

    /// The remote endpoint replied with an error frame.
    #[error("remote hasher error: {0}")]
    Protocol(String),

    /// The remote endpoint was busy past the configured back-off budget.
    #[error("remote hasher busy")]
    Busy,
}

/// A pluggable source of file-content digests, used to amortize hashing
/// across many sibling invocations sharing a large build.
pub trait RemoteHasher: Send + Sync {
    /// Hashes the given paths, returning one digest per path in order.
    fn hash_paths(&self, paths: &[PathBuf]) -> Result<Vec<Digest>, RemoteHasherError>;
}

/// A remote hasher that is never reachable, used when `CLCACHE_SERVER` is
/// unset. [`FileHasher`](crate::FileHasher) falls back to local hashing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRemoteHasher;

impl RemoteHasher for NullRemoteHasher {
    fn hash_paths(&self, _paths: &[PathBuf]) -> Result<Vec<Digest>, RemoteHasherError> {
        Err(RemoteHasherError::Unreachable("no server configured".into()))
    }
}
