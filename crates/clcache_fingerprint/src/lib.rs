//! Fingerprint derivations: canonical command-line reconstruction, compiler
//! hash, direct-mode manifest hash, and both flavors of object key.
//!
//! Every function here is pure given its inputs (no global environment
//! reads, no locking) so the compile pipeline crate can unit-test the
//! state machine around these calls without a real `cl.exe`.

#![warn(missing_docs)]

mod cmdline;
mod error;
mod keys;

pub use cmdline::{
    canonical_cmdline, collapse_path, expand_placeholder, strip_preprocessor_only_flags,
    Arguments, NO_DIRECT_STRIP_FLAGS, PATH_BEARING_FLAGS,
};
pub use error::FingerprintError;
pub use keys::{
    compiler_hash, direct_manifest_hash, direct_object_key, includes_content_hash,
    no_direct_object_key, MANIFEST_FORMAT_VERSION,
};
