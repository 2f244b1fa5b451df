//! On-disk object cache for a single repository.
//!
//! Objects are stored at `{base}/{repository id}/{type subdir}/{name}`. A
//! `{base}/version` marker records the cache format. Writes go to a temp file
//! in the target subdirectory first and are renamed into place, so readers
//! never observe partial content.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::{NamedTempFile, TempPath};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::backend::{FileType, Handle, ObjectReader};

use super::cache_dirs::{create_private_dir, default_cache_dir, exists};
use super::error::{CacheError, Result, io_err};
use super::layout::{CacheLayout, is_plain_component};

/// The cache format version written by this build.
pub const CACHE_VERSION: u32 = 1;

/// Name of the format version marker in the cache root.
const VERSION_FILE: &str = "version";

/// Prefix of in-flight temp files. Object names never start with a dot.
const TEMP_PREFIX: &str = ".tmp";

// =============================================================================
// ObjectCache Trait
// =============================================================================

/// Interface for a local mirror of backend objects.
#[async_trait]
pub trait ObjectCache: Send + Sync {
    /// Whether this object can be mirrored. Objects that cannot are passed
    /// straight through to the backend.
    fn is_cacheable(&self, h: &Handle) -> bool;

    /// Whether the object is present in the cache.
    async fn has(&self, h: &Handle) -> bool;

    /// Open a cached object. `length == 0` reads from `offset` to the end.
    async fn load(&self, h: &Handle, length: u64, offset: u64) -> Result<ObjectReader>;

    /// Store the contents of `rd`, replacing any cached copy.
    async fn save(&self, h: &Handle, rd: ObjectReader) -> Result<()>;

    /// Delete a cached object. Fails with `NotCached` if it is absent.
    async fn remove(&self, h: &Handle) -> Result<()>;
}

// =============================================================================
// CacheStore
// =============================================================================

/// Filesystem-backed cache for one repository.
#[derive(Debug, Clone)]
pub struct CacheStore {
    base_dir: PathBuf,
    path: PathBuf,
    layout: CacheLayout,
}

impl CacheStore {
    /// Open (creating if needed) the cache for `repo_id`.
    ///
    /// When `base_dir` is `None` the platform cache directory is used. Fails
    /// with `VersionTooNew` without touching the filesystem if the cache was
    /// written by a newer format.
    pub async fn open(
        repo_id: &str,
        base_dir: Option<&Path>,
        layout: CacheLayout,
    ) -> Result<Self> {
        layout.validate()?;
        if !is_plain_component(repo_id) {
            return Err(CacheError::InvalidLayout(format!(
                "repository id '{}' is not a plain directory name",
                repo_id
            )));
        }

        let base_dir = match base_dir {
            Some(dir) => dir.to_path_buf(),
            None => default_cache_dir()?,
        };
        debug!(dir = %base_dir.display(), id = repo_id, "using cache dir");

        let version = read_version(&base_dir).await?;
        if version > CACHE_VERSION {
            return Err(CacheError::VersionTooNew {
                found: version,
                supported: CACHE_VERSION,
            });
        }

        if version < CACHE_VERSION {
            create_private_dir(&base_dir).await?;
            write_version(&base_dir).await?;
        }

        let path = base_dir.join(repo_id);
        for subdir in layout.subdirs() {
            create_private_dir(&path.join(subdir)).await?;
        }

        Ok(Self {
            base_dir,
            path,
            layout,
        })
    }

    /// The cache root shared by all repositories.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The directory holding this repository's cache.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The layout this store was opened with.
    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Directory of a subdirectory from the layout.
    pub(crate) fn subdir_path(&self, file_type: FileType) -> Option<PathBuf> {
        self.layout
            .subdir(file_type)
            .map(|subdir| self.path.join(subdir))
    }

    /// Path of a cached object, or `None` if the handle cannot be cached.
    fn object_path(&self, h: &Handle) -> Option<PathBuf> {
        if !self.layout.is_cacheable(h.file_type) || !is_plain_component(&h.name) {
            return None;
        }
        self.subdir_path(h.file_type).map(|dir| dir.join(&h.name))
    }

    /// List the names of cached objects of a type, sorted.
    pub async fn list(&self, file_type: FileType) -> Result<Vec<String>> {
        if !self.layout.is_cacheable(file_type) {
            return Ok(Vec::new());
        }
        let Some(dir) = self.subdir_path(file_type) else {
            return Ok(Vec::new());
        };

        let mut names = read_dir_names(&dir).await?;
        names.retain(|name| is_plain_component(name));
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl ObjectCache for CacheStore {
    fn is_cacheable(&self, h: &Handle) -> bool {
        self.object_path(h).is_some()
    }

    async fn has(&self, h: &Handle) -> bool {
        match self.object_path(h) {
            Some(path) => exists(&path).await,
            None => false,
        }
    }

    async fn load(&self, h: &Handle, length: u64, offset: u64) -> Result<ObjectReader> {
        let path = self
            .object_path(h)
            .ok_or_else(|| CacheError::NotCached { handle: h.clone() })?;

        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::NotCached { handle: h.clone() });
            }
            Err(e) => return Err(io_err("open", &path)(e)),
        };

        let size = file.metadata().await.map_err(io_err("stat", &path))?.len();
        let end = if length == 0 {
            Some(size)
        } else {
            offset.checked_add(length)
        };
        let end = match end {
            Some(end) if offset <= size && end <= size => end,
            _ => {
                return Err(CacheError::Range {
                    handle: h.clone(),
                    offset,
                    length,
                    size,
                });
            }
        };

        if offset > 0 {
            file.seek(SeekFrom::Start(offset))
                .await
                .map_err(io_err("seek", &path))?;
        }

        Ok(Box::new(file.take(end - offset)))
    }

    async fn save(&self, h: &Handle, mut rd: ObjectReader) -> Result<()> {
        let path = self
            .object_path(h)
            .ok_or_else(|| CacheError::NotCacheable { handle: h.clone() })?;
        let dir = self
            .subdir_path(h.file_type)
            .ok_or_else(|| CacheError::NotCacheable { handle: h.clone() })?;

        // The temp file is created owner-only and deleted on drop unless
        // persisted, which also covers a save future that is dropped midway.
        let (file, temp_path) = create_temp_file(&dir).await?.into_parts();

        let mut file = fs::File::from_std(file);
        tokio::io::copy(&mut rd, &mut file)
            .await
            .map_err(io_err("write", &temp_path))?;
        file.flush().await.map_err(io_err("flush", &temp_path))?;
        file.sync_all().await.map_err(io_err("sync", &temp_path))?;
        drop(file);

        persist_temp_file(temp_path, &path).await?;

        debug!(handle = %h, "saved to cache");
        Ok(())
    }

    async fn remove(&self, h: &Handle) -> Result<()> {
        let path = self
            .object_path(h)
            .ok_or_else(|| CacheError::NotCached { handle: h.clone() })?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CacheError::NotCached { handle: h.clone() })
            }
            Err(e) => Err(io_err("remove", &path)(e)),
        }
    }
}

// =============================================================================
// Version Marker
// =============================================================================

/// Read the format version, treating a missing marker as version 0.
async fn read_version(base_dir: &Path) -> Result<u32> {
    let path = base_dir.join(VERSION_FILE);
    let contents = match fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(io_err("read", &path)(e)),
    };

    contents
        .trim()
        .parse()
        .map_err(|_| CacheError::InvalidVersion {
            path,
            value: contents.trim().to_string(),
        })
}

/// Atomically replace the version marker with [`CACHE_VERSION`].
async fn write_version(base_dir: &Path) -> Result<()> {
    let path = base_dir.join(VERSION_FILE);
    let (file, temp_path) = create_temp_file(base_dir).await?.into_parts();

    let mut file = fs::File::from_std(file);
    file.write_all(CACHE_VERSION.to_string().as_bytes())
        .await
        .map_err(io_err("write", &temp_path))?;
    file.sync_all().await.map_err(io_err("sync", &temp_path))?;
    drop(file);

    persist_temp_file(temp_path, &path).await
}

// =============================================================================
// Temp Files
// =============================================================================

/// Create an owner-only temp file in `dir` on the blocking pool.
async fn create_temp_file(dir: &Path) -> Result<NamedTempFile> {
    let target = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&target)
    })
    .await
    .map_err(|e| io_err("create temp file in", dir)(std::io::Error::other(e)))?
    .map_err(io_err("create temp file in", dir))
}

/// Rename a finished temp file over `path` on the blocking pool.
async fn persist_temp_file(temp_path: TempPath, path: &Path) -> Result<()> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || temp_path.persist(&target))
        .await
        .map_err(|e| io_err("rename", path)(std::io::Error::other(e)))?
        .map_err(|e| io_err("rename", path)(e.error))
}

/// List the entry names of a directory.
pub(crate) async fn read_dir_names(dir: &Path) -> Result<Vec<String>> {
    let mut entries = fs::read_dir(dir).await.map_err(io_err("open", dir))?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err("read", dir))? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

// =============================================================================
// NoopCache
// =============================================================================

/// A cache that never stores anything.
///
/// Every type is reported as non-cacheable, so a decorated backend passes all
/// calls straight through. Use this when caching is disabled.
pub struct NoopCache;

#[async_trait]
impl ObjectCache for NoopCache {
    fn is_cacheable(&self, _h: &Handle) -> bool {
        false
    }

    async fn has(&self, _h: &Handle) -> bool {
        false
    }

    async fn load(&self, h: &Handle, _length: u64, _offset: u64) -> Result<ObjectReader> {
        Err(CacheError::NotCached { handle: h.clone() })
    }

    async fn save(&self, h: &Handle, _rd: ObjectReader) -> Result<()> {
        Err(CacheError::NotCacheable { handle: h.clone() })
    }

    async fn remove(&self, h: &Handle) -> Result<()> {
        Err(CacheError::NotCached { handle: h.clone() })
    }
}

// =============================================================================
// Tests
// =============================================================================
