//! The content-addressed object store and manifest store: the two
//! persistent layers the compile pipeline reads and writes on every
//! invocation.
//!
//! Both stores use the same two-level sharded layout (`root/<hh>/...`,
//! where `hh` is a digest's first two hex characters) and the same
//! publish-by-rename discipline for crash safety. [`eviction::evict`]
//! bounds their combined size.

#![warn(missing_docs)]

mod copy;
mod error;
mod eviction;
mod manifest;
mod object;

pub use copy::CopyOptions;
pub use error::StoreError;
pub use eviction::{evict, EvictionResult};
pub use manifest::{Manifest, ManifestEntry, ManifestStore, MAX_MANIFEST_ENTRIES};
pub use object::{CompilerArtifacts, ObjectStore};
