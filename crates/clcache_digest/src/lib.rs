//! Content digests and file hashing for the cache's fingerprinting pipeline.
//!
//! Every fingerprint in the cache — compiler identity, object keys, manifest
//! hashes — is built from the single [`Digest`] type defined here. Hashing is
//! intentionally non-cryptographic: collision resistance against accidental
//! collisions on realistic build inputs is the only requirement.

#![warn(missing_docs)]

mod digest;
mod hasher;
mod remote;

pub use digest::Digest;
pub use hasher::FileHasher;
pub use remote::{NullRemoteHasher, RemoteHasher, RemoteHasherError};

use thiserror::Error;

/// Errors raised while hashing a file.
#[derive(Debug, Error)]
pub enum DigestError {
    /// The file to hash could not be found or read.
    #[error("include file not found: {path}")]
    IncludeNotFound {
        /// The path that could not be read.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
