//! Per-invocation file hashing with in-process memoization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::digest::Digest;
use crate::remote::RemoteHasher;
use crate::DigestError;

/// Hashes files, memoizing results for the lifetime of one invocation.
///
/// Memoization is safe because callers guarantee the files under hash are
/// not modified while a single `clcache` invocation is running. An optional
/// [`RemoteHasher`] is consulted before falling back to local hashing, to
/// amortize hashing across sibling invocations sharing a build.
pub struct FileHasher<R: RemoteHasher = crate::remote::NullRemoteHasher> {
    memo: Mutex<HashMap<PathBuf, Digest>>,
    remote: Option<R>,
}

impl FileHasher<crate::remote::NullRemoteHasher> {
    /// Creates a hasher with no remote back end.
    pub fn local() -> Self {
        Self {
            memo: Mutex::new(HashMap::new()),
            remote: None,
        }
    }
}

impl<R: RemoteHasher> FileHasher<R> {
    /// Creates a hasher that consults `remote` before hashing locally.
    pub fn with_remote(remote: R) -> Self {
        Self {
            memo: Mutex::new(HashMap::new()),
            remote: Some(remote),
        }
    }

    /// `hashFile(path, extra)`: `H(read(path) ∥ utf-8(extra))`.
    ///
    /// Extra is appended to the digest input, not mixed independently, so
    /// that `hash_file(path, None)` and `hash_file(path, Some(""))` agree.
    pub fn hash_file(&self, path: &Path, extra: Option<&str>) -> Result<Digest, DigestError> {
        if extra.is_none() {
            if let Some(d) = self.memo.lock().unwrap().get(path) {
                return Ok(*d);
            }
        }

        let content = std::fs::read(path).map_err(|source| {
            tracing::trace!(path = %path.display(), "file not found while hashing");
            DigestError::IncludeNotFound {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let digest = if let Some(remote) = &self.remote {
            match remote.hash_paths(std::slice::from_ref(&path.to_path_buf())) {
                Ok(mut digests) if digests.len() == 1 => digests.pop().unwrap(),
                _ => self.digest_bytes(&content, extra),
            }
        } else {
            self.digest_bytes(&content, extra)
        };

        if extra.is_none() {
            self.memo.lock().unwrap().insert(path.to_path_buf(), digest);
        }
        Ok(digest)
    }

    fn digest_bytes(&self, content: &[u8], extra: Option<&str>) -> Digest {
        match extra {
            None => Digest::from_bytes(content),
            Some(e) => {
                let mut buf = content.to_vec();
                buf.extend_from_slice(e.as_bytes());
                Digest::from_bytes(&buf)
            }
        }
    }

    /// Hashes several files, silently omitting any that cannot be read.
    pub fn hash_files(&self, paths: &[PathBuf]) -> HashMap<PathBuf, Digest> {
        let mut out = HashMap::with_capacity(paths.len());
        for path in paths {
            if let Ok(d) = self.hash_file(path, None) {
                out.insert(path.clone(), d);
            }
        }
        out
    }
}
