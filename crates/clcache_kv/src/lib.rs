//! A persistent JSON key/value document with atomic write-if-dirty saves.
//!
//! `KvStore` underlies [`clcache_config`](../clcache_config/index.html) and
//! [`clcache_stats`](../clcache_stats/index.html). It loads a JSON object at
//! open time (a missing file is an empty document; malformed JSON is an
//! empty document plus a warning — never a hard error), tracks a dirty flag,
//! and writes only when that flag is set, via temp-file-then-rename so a
//! reader never observes a half-written document.

#![warn(missing_docs)]

use std::cell::Cell;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors saving a [`KvStore`] to disk.
#[derive(Debug, Error)]
pub enum KvError {
    /// Writing the temporary file or renaming it over the target failed.
    #[error("failed to persist {path}: {source}")]
    Io {
        /// The document path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The in-memory document could not be serialized to JSON.
    #[error("failed to serialize document {path}: {source}")]
    Serialize {
        /// The document path.
        path: PathBuf,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// A JSON object persisted at a path, loaded lazily and saved only when
/// modified.
pub struct KvStore {
    path: PathBuf,
    document: Map<String, Value>,
    dirty: Cell<bool>,
}

impl KvStore {
    /// Opens (or lazily initializes) the document at `path`.
    ///
    /// A missing file yields an empty document. A file that fails to parse
    /// as a JSON object also yields an empty document, after logging a
    /// warning — corrupt KV documents never abort the cache.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let document = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<Value>(&s).ok())
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_else(|| {
                if path.exists() {
                    tracing::warn!(path = %path.display(), "malformed KV document, starting empty");
                }
                Map::new()
            });

        Self {
            path,
            document,
            dirty: Cell::new(false),
        }
    }

    /// Reads a value. Never marks the document dirty.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Reads an integer counter, defaulting to 0 if absent or non-numeric.
    pub fn get_u64(&self, key: &str) -> u64 {
        self.document.get(key).and_then(Value::as_u64).unwrap_or(0)
    }

    /// Writes a value and marks the document dirty.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.document.insert(key.into(), value.into());
        self.dirty.set(true);
    }

    /// Removes a key, marking the document dirty if it was present.
    pub fn remove(&mut self, key: &str) {
        if self.document.remove(key).is_some() {
            self.dirty.set(true);
        }
    }

    /// `true` if there are unsaved writes.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Persists the document if dirty, via write-temp-then-rename.
    ///
    /// A no-op when nothing has changed since the last successful save.
    pub fn save(&self) -> Result<(), KvError> {
        if !self.dirty.get() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| KvError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json =
            serde_json::to_string_pretty(&Value::Object(self.document.clone())).map_err(|source| {
                KvError::Serialize {
                    path: self.path.clone(),
                    source,
                }
            })?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json).map_err(|source| KvError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| KvError::Io {
            path: self.path.clone(),
            source,
        })?;

        self.dirty.set(false);
        Ok(())
    }
}
