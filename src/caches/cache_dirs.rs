//! Platform helpers: default cache location and owner-only file creation.

use std::path::{Path, PathBuf};

use tokio::fs;

use super::error::{CacheError, Result, io_err};

/// Name of the application directory inside the platform cache directory.
pub const CACHE_DIR_NAME: &str = "repocache";

/// The default cache root: `{platform cache dir}/repocache`.
///
/// On Linux this follows `$XDG_CACHE_HOME`, falling back to `~/.cache`.
pub fn default_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join(CACHE_DIR_NAME))
        .ok_or(CacheError::NoDefaultDir)
}

/// Create `path` and any missing parents, accessible only by the owner.
pub async fn create_private_dir(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder
        .create(path)
        .await
        .map_err(io_err("create directory", path))
}

/// Create an empty file readable and writable only by the owner, truncating
/// any existing file.
pub async fn touch_private_file(path: &Path) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    options
        .open(path)
        .await
        .map(drop)
        .map_err(io_err("create", path))
}

/// Whether `path` exists, treating errors as absence.
pub async fn exists(path: &Path) -> bool {
    matches!(fs::try_exists(path).await, Ok(true))
}
