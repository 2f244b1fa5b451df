//! Error types for the local cache.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::backend::Handle;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The object is not present in the local cache.
    #[error("{handle} is not cached")]
    NotCached { handle: Handle },

    /// The object's type is not mirrored by this cache.
    #[error("{handle} is not a cacheable type")]
    NotCacheable { handle: Handle },

    /// The on-disk cache was written by a newer format version.
    #[error("cache version {found} is newer than the supported version {supported}")]
    VersionTooNew { found: u32, supported: u32 },

    /// The version marker could not be parsed.
    #[error("invalid cache version '{value}' in {path}")]
    InvalidVersion { path: PathBuf, value: String },

    /// The requested byte range lies outside the cached object.
    #[error("range {offset}+{length} is out of bounds for {handle} (size {size})")]
    Range {
        handle: Handle,
        offset: u64,
        length: u64,
        size: u64,
    },

    /// The key registry holds no key.
    #[error("no key found")]
    NoKeyFound,

    /// A key registry entry is not a valid key id.
    #[error("invalid key id: {0}")]
    InvalidId(String),

    /// The cache layout or repository id is unusable.
    #[error("invalid cache layout: {0}")]
    InvalidLayout(String),

    /// No cache directory was given and none could be determined.
    #[error("unable to determine a default cache directory")]
    NoDefaultDir,

    /// A filesystem operation failed.
    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    /// Whether this error means the object is simply absent from the cache.
    pub fn is_not_cached(&self) -> bool {
        matches!(self, CacheError::NotCached { .. })
    }
}

/// Build a closure that wraps an I/O error with the operation and path.
pub(crate) fn io_err(
    op: &'static str,
    path: &Path,
) -> impl FnOnce(std::io::Error) -> CacheError + use<> {
    let path = path.to_path_buf();
    move |source| CacheError::Io { op, path, source }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
