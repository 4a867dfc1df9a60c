//! The content-addressed object store: sharded directories of
//! `{object, output.txt, stderr.txt}` triples.

use std::path::{Path, PathBuf};

use clcache_digest::Digest;
use clcache_lock::Lock;

use crate::copy::{self, CopyOptions};
use crate::error::StoreError;

const OBJECT_FILE: &str = "object";
const STDOUT_FILE: &str = "output.txt";
const STDERR_FILE: &str = "stderr.txt";

/// The compiler's captured output for one cached invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerArtifacts {
    /// Path to the produced object file, relative to the caller's build
    /// directory. `None` when the invocation produced diagnostics only.
    pub object_file_path: Option<PathBuf>,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error. Omitted on disk when empty.
    pub stderr: Vec<u8>,
}

/// Sharded, content-addressed directory of compiler artifacts.
pub struct ObjectStore {
    root: PathBuf,
    lock_dir: PathBuf,
}

impl ObjectStore {
    /// Opens the object store rooted at `<cache_dir>/objects`.
    pub fn new(cache_dir: &Path) -> Self {
        let root = cache_dir.join("objects");
        Self {
            lock_dir: root.join(".locks"),
            root,
        }
    }

    fn shard_dir(&self, k: &Digest) -> PathBuf {
        self.root.join(k.shard_prefix())
    }

    fn entry_dir(&self, k: &Digest) -> PathBuf {
        self.shard_dir(k).join(k.to_string())
    }

    /// The section lock guarding key `k`'s shard.
    pub fn lock_for(&self, k: &Digest) -> Lock {
        Lock::new(&self.lock_dir, &k.shard_prefix())
    }

    /// `true` if an entry for `k` is present. Directory existence is the
    /// authoritative predicate.
    pub fn has(&self, k: &Digest) -> bool {
        self.entry_dir(k).is_dir()
    }

    /// Reads the entry for `k`. Caller must have already checked [`has`](Self::has).
    pub fn get(&self, k: &Digest) -> Result<CompilerArtifacts, StoreError> {
        let dir = self.entry_dir(k);
        if !dir.is_dir() {
            return Err(StoreError::MissingEntry { key: k.to_string() });
        }

        let object_file_path = if dir.join(OBJECT_FILE).exists() {
            Some(dir.join(OBJECT_FILE))
        } else {
            None
        };
        let stdout = std::fs::read(dir.join(STDOUT_FILE)).unwrap_or_default();
        let stderr_path = dir.join(STDERR_FILE);
        let stderr = if stderr_path.exists() {
            std::fs::read(&stderr_path).map_err(|source| StoreError::Io {
                path: stderr_path,
                source,
            })?
        } else {
            Vec::new()
        };

        Ok(CompilerArtifacts {
            object_file_path,
            stdout,
            stderr,
        })
    }

    /// Publishes an entry for `k` atomically: builds it in a sibling `.new`
    /// directory, then renames it over any existing entry. Returns the
    /// number of bytes written for the object payload.
    ///
    /// `object_src` is the build directory's freshly compiled object file,
    /// if the invocation produced one.
    pub fn set(
        &self,
        k: &Digest,
        object_src: Option<&Path>,
        stdout: &[u8],
        stderr: &[u8],
        copy_opts: &CopyOptions,
    ) -> Result<u64, StoreError> {
        let shard = self.shard_dir(k);
        std::fs::create_dir_all(&shard).map_err(|source| StoreError::Io {
            path: shard.clone(),
            source,
        })?;

        let final_dir = self.entry_dir(k);
        let staging_dir = shard.join(format!("{k}.new"));
        if staging_dir.exists() {
            std::fs::remove_dir_all(&staging_dir).map_err(|source| StoreError::Io {
                path: staging_dir.clone(),
                source,
            })?;
        }
        std::fs::create_dir_all(&staging_dir).map_err(|source| StoreError::Io {
            path: staging_dir.clone(),
            source,
        })?;

        let mut bytes_written = 0u64;
        if let Some(src) = object_src {
            bytes_written = copy::copy_in(src, &staging_dir.join(OBJECT_FILE), copy_opts)?;
        }

        std::fs::write(staging_dir.join(STDOUT_FILE), stdout).map_err(|source| StoreError::Io {
            path: staging_dir.join(STDOUT_FILE),
            source,
        })?;
        if !stderr.is_empty() {
            std::fs::write(staging_dir.join(STDERR_FILE), stderr).map_err(|source| {
                StoreError::Io {
                    path: staging_dir.join(STDERR_FILE),
                    source,
                }
            })?;
        }

        if final_dir.exists() {
            std::fs::remove_dir_all(&final_dir).map_err(|source| StoreError::Io {
                path: final_dir.clone(),
                source,
            })?;
        }
        std::fs::rename(&staging_dir, &final_dir).map_err(|source| StoreError::Io {
            path: final_dir,
            source,
        })?;

        Ok(bytes_written)
    }

    /// Copies the cached object out to `dst`, honoring `copy_opts`.
    pub fn copy_object_to(
        &self,
        k: &Digest,
        dst: &Path,
        copy_opts: &CopyOptions,
    ) -> Result<(), StoreError> {
        let src = self.entry_dir(k).join(OBJECT_FILE);
        copy::copy_out(&src, dst, copy_opts)
    }

    /// Recursively removes the entry for `k`, ignoring a missing target.
    pub fn remove(&self, k: &Digest) -> Result<(), StoreError> {
        let dir = self.entry_dir(k);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path: dir, source }),
        }
    }

    /// The store's root directory, for eviction's directory walk.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
