//! Compiler hash, manifest hash, and object-key derivations.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use clcache_digest::{Digest, FileHasher, RemoteHasher};

use crate::error::FingerprintError;

/// The manifest format version `V`, mixed into the manifest hash so a
/// deliberate bump invalidates every previously stored manifest without
/// touching a byte of them — they simply become unreachable and are
/// reclaimed by eviction.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

/// `H("mtime|size|clcache-version")` of the compiler binary. Intentionally
/// O(1) — it never reads the (often multi-hundred-MB) binary's contents.
pub fn compiler_hash(compiler_path: &Path) -> Result<Digest, FingerprintError> {
    let metadata =
        std::fs::metadata(compiler_path).map_err(|source| FingerprintError::CompilerMeta {
            path: compiler_path.to_path_buf(),
            source,
        })?;
    let mtime = metadata
        .modified()
        .map_err(|source| FingerprintError::CompilerMeta {
            path: compiler_path.to_path_buf(),
            source,
        })?
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let size = metadata.len();

    Ok(Digest::from_str(&format!(
        "{mtime}|{size}|{}",
        env!("CARGO_PKG_VERSION")
    )))
}

/// `H(h1 "," h2 ...)` over the per-header content hashes, after sorting and
/// de-duplicating `include_files` — this is what makes the hash
/// order-independent of the order headers were discovered in.
pub fn includes_content_hash<R: RemoteHasher>(
    hasher: &FileHasher<R>,
    include_files: &[PathBuf],
) -> Result<Digest, FingerprintError> {
    let mut sorted = include_files.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut hex_hashes = Vec::with_capacity(sorted.len());
    for path in &sorted {
        hex_hashes.push(hasher.hash_file(path, None)?.to_string());
    }

    Ok(Digest::from_str(&hex_hashes.join(",")))
}

/// `m = hashFile(sourceFile, extra = compilerHash "|" canonicalCmdline "|" V)`.
///
/// The source file's content is part of `m`; header contents are not —
/// those are captured separately by [`includes_content_hash`].
pub fn direct_manifest_hash<R: RemoteHasher>(
    hasher: &FileHasher<R>,
    source_file: &Path,
    compiler_hash: &Digest,
    canonical_cmdline: &str,
    manifest_version: u32,
) -> Result<Digest, FingerprintError> {
    let extra = format!("{compiler_hash}|{canonical_cmdline}|{manifest_version}");
    Ok(hasher.hash_file(source_file, Some(&extra))?)
}

/// `k = hashString(m ∥ includesContentHash)`. Mixing in the manifest hash
/// keeps two different source files with identical include sets from
/// colliding on `k`.
pub fn direct_object_key(manifest_hash: &Digest, includes_content_hash: &Digest) -> Digest {
    Digest::combine(manifest_hash, "", includes_content_hash)
}

/// `k = H(compilerHash " " normalizedCmdline ∥ P)` where `P` is the
/// preprocessed source and `normalizedCmdline` has every preprocessor-only,
/// output-path, and parallelism switch stripped (see
/// [`crate::cmdline::strip_preprocessor_only_flags`]).
pub fn no_direct_object_key(
    compiler_hash: &Digest,
    normalized_cmdline: &str,
    preprocessed: &[u8],
) -> Digest {
    let mut buf = format!("{compiler_hash} {normalized_cmdline}").into_bytes();
    buf.extend_from_slice(preprocessed);
    Digest::from_bytes(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clcache_digest::FileHasher;

    #[test]
    fn compiler_hash_is_deterministic_for_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cl.exe");
        std::fs::write(&path, b"fake compiler bytes").unwrap();

        let a = compiler_hash(&path).unwrap();
        let b = compiler_hash(&path).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn compiler_hash_changes_with_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cl.exe");
        std::fs::write(&path, b"short").unwrap();
        let a = compiler_hash(&path).unwrap();

        std::fs::write(&path, b"a much longer compiler binary payload").unwrap();
        let b = compiler_hash(&path).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn includes_content_hash_is_order_independent() {
        let dir = tempfile::tempdir().unwrap();
        let a_path = dir.path().join("a.h");
        let b_path = dir.path().join("b.h");
        std::fs::write(&a_path, b"a contents").unwrap();
        std::fs::write(&b_path, b"b contents").unwrap();

        let hasher = FileHasher::local();
        let forward = includes_content_hash(&hasher, &[a_path.clone(), b_path.clone()]).unwrap();
        let backward = includes_content_hash(&hasher, &[b_path, a_path]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn includes_content_hash_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.h");
        std::fs::write(&path, b"contents").unwrap();

        let hasher = FileHasher::local();
        let once = includes_content_hash(&hasher, &[path.clone()]).unwrap();
        let twice = includes_content_hash(&hasher, &[path.clone(), path]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn direct_object_key_mixes_in_manifest_hash() {
        let includes = Digest::from_str("same-includes");
        let m1 = Digest::from_str("manifest-1");
        let m2 = Digest::from_str("manifest-2");
        assert_ne!(
            direct_object_key(&m1, &includes),
            direct_object_key(&m2, &includes)
        );
    }

    #[test]
    fn no_direct_object_key_changes_with_preprocessed_output() {
        let compiler = Digest::from_str("compiler");
        let a = no_direct_object_key(&compiler, "/c", b"int main(){}");
        let b = no_direct_object_key(&compiler, "/c", b"int main(){return 1;}");
        assert_ne!(a, b);
    }
}
