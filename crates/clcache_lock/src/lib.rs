//! Host-wide named mutual exclusion, the only concurrency primitive the
//! cache uses for persistent state.
//!
//! A [`Lock`] is acquired by name (derived from a path) with a configurable
//! timeout. It is backed by an advisory file lock rather than a
//! platform-specific named mutex: `fs4`'s exclusive file lock is released by
//! the OS the instant the holding process exits for any reason, including a
//! crash, which gives exactly the "abandoned lock is available" semantics
//! the cache depends on to survive builder crashes without manual repair.

#![warn(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs4::FileExt;
use thiserror::Error;

/// Default lock acquisition timeout, matching `CLCACHE_OBJECT_CACHE_TIMEOUT_MS`'s
/// documented default. Callers that read the environment variable should
/// override this via [`Lock::with_timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Smallest backoff between polling attempts.
const MIN_BACKOFF: Duration = Duration::from_millis(5);
/// Largest backoff between polling attempts.
const MAX_BACKOFF: Duration = Duration::from_millis(100);

/// Errors raised acquiring a [`Lock`].
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock could not be acquired within the configured timeout.
    #[error("timed out after {waited:?} waiting for lock {name:?}; raise CLCACHE_OBJECT_CACHE_TIMEOUT_MS if this persists")]
    Timeout {
        /// The sanitized lock name.
        name: String,
        /// How long acquisition was attempted before giving up.
        waited: Duration,
    },

    /// The lock file itself could not be created or opened.
    #[error("failed to open lock file {path}: {source}")]
    Io {
        /// The lock file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Replaces path separators and colons with `-`, the scheme spec.md uses to
/// derive a lock name from a path.
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '/' || c == '\\' || c == ':' { '-' } else { c })
        .collect()
}

/// A named, host-wide, timed mutual-exclusion lock.
///
/// Acquire with [`Lock::acquire`]; the returned [`LockGuard`] releases on
/// every exit path, including unwinding, because release happens in `Drop`.
pub struct Lock {
    name: String,
    path: PathBuf,
    timeout: Duration,
}

impl Lock {
    /// Creates a lock whose file lives at `lock_dir/<sanitized(raw_name)>.lock`.
    pub fn new(lock_dir: &Path, raw_name: &str) -> Self {
        let name = sanitize_name(raw_name);
        let path = lock_dir.join(format!("{name}.lock"));
        Self {
            name,
            path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the acquisition timeout (default [`DEFAULT_TIMEOUT`]).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Blocks up to the configured timeout trying to acquire the lock.
    ///
    /// An abandoned lock (the previous holder's process died mid-section)
    /// is acquired as if it were never held — the OS clears an advisory
    /// file lock the moment the owning process exits.
    pub fn acquire(&self) -> Result<LockGuard, LockError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)
            .map_err(|source| LockError::Io {
                path: self.path.clone(),
                source,
            })?;

        let start = Instant::now();
        let mut backoff = MIN_BACKOFF;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    tracing::trace!(name = %self.name, "acquired lock");
                    return Ok(LockGuard { file });
                }
                Err(_) => {
                    let waited = start.elapsed();
                    if waited >= self.timeout {
                        return Err(LockError::Timeout {
                            name: self.name.clone(),
                            waited,
                        });
                    }
                    std::thread::sleep(backoff.min(self.timeout - waited));
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }
}

/// An acquired [`Lock`]; releases the underlying file lock when dropped.
pub struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_separators_and_colons() {
        assert_eq!(sanitize_name("C:/foo/bar"), "C--foo-bar");
        assert_eq!(sanitize_name(r"C:\foo\bar"), "C--foo-bar");
    }

    #[test]
    fn acquire_and_release_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let lock = Lock::new(dir.path(), "ab/shard");
        let guard = lock.acquire().unwrap();
        drop(guard);

        // Reacquiring after drop must succeed immediately.
        let lock2 = Lock::new(dir.path(), "ab/shard");
        assert!(lock2.acquire().is_ok());
    }

    #[test]
    fn contention_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let lock = Lock::new(dir.path(), "contended").with_timeout(Duration::from_millis(50));
        let _held = lock.acquire().unwrap();

        let lock2 = Lock::new(dir.path(), "contended").with_timeout(Duration::from_millis(50));
        let err = lock2.acquire().unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
    }

    #[test]
    fn different_names_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();
        let a = Lock::new(dir.path(), "aa/one").acquire().unwrap();
        let b = Lock::new(dir.path(), "bb/two").acquire().unwrap();
        drop(a);
        drop(b);
    }
}
