//! Disk cache for raw Sisu API responses.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde_json::Value;
use thiserror::Error;

/// Errors raised by cache reads and writes.
///
/// These are fatal: the cache is a local convenience layer, and a cache
/// directory that cannot be read or written indicates a broken environment
/// rather than a recoverable condition.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache file or directory could not be read or written.
    #[error("cache I/O for {id}: {source}")]
    Io {
        /// The identifier whose cache entry was being accessed.
        id: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The cached document is not valid JSON.
    #[error("cache entry {id} is not valid JSON: {source}")]
    Malformed {
        /// The identifier whose cache entry was being read.
        id: String,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// A directory of previously fetched JSON documents, one pretty-printed file
/// per identifier named `<identifier>.json`.
///
/// Concurrent invocations of the tool against the same cache directory are
/// not synchronized against interleaved writes to the same entry; callers
/// must run one process at a time.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    /// Creates a cache rooted at `dir`. The directory is created lazily on
    /// the first [`store`](Self::store).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The path of the cache entry for `id`.
    #[must_use]
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Looks up a previously stored document.
    ///
    /// A missing entry is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the entry exists but cannot be read or is
    /// not valid JSON.
    pub fn get(&self, id: &str) -> Result<Option<Value>, CacheError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|source| CacheError::Io {
            id: id.to_string(),
            source,
        })?;
        let value = serde_json::from_str(&text).map_err(|source| CacheError::Malformed {
            id: id.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    /// Stores a fetched document under `id`, pretty-printed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the cache directory or file cannot be
    /// written.
    pub fn store(&self, id: &str, document: &Value) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            id: id.to_string(),
            source,
        };
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let text = serde_json::to_string_pretty(document).map_err(|source| {
            CacheError::Malformed {
                id: id.to_string(),
                source,
            }
        })?;
        fs::write(self.path_for(id), text).map_err(io_err)
    }

    /// The cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
