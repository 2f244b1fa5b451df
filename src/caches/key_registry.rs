//! Remembers the id of the key that last unlocked the repository.
//!
//! The hint is a single zero-byte marker file in the key subdirectory, named
//! after the key id. It is an optimization only: a missing or stale hint just
//! means the caller has to try every key.

use std::path::PathBuf;

use tokio::fs;
use tracing::debug;

use crate::backend::{FileType, Id};

use super::cache_dirs::touch_private_file;
use super::cache_store::{CacheStore, read_dir_names};
use super::error::{CacheError, Result, io_err};

impl CacheStore {
    fn key_dir(&self) -> Result<PathBuf> {
        self.subdir_path(FileType::Key).ok_or_else(|| {
            CacheError::InvalidLayout("no subdirectory for the key registry".to_string())
        })
    }

    /// Record `id` as the last used key, replacing any previous entry.
    ///
    /// Existing entries are deleted before the new marker is created, so an
    /// interrupted call leaves no entry rather than several.
    pub async fn set_key(&self, id: &Id) -> Result<()> {
        let dir = self.key_dir()?;

        for name in read_dir_names(&dir).await? {
            let path = dir.join(&name);
            fs::remove_file(&path)
                .await
                .map_err(io_err("remove", &path))?;
        }

        touch_private_file(&dir.join(id.to_string())).await?;
        debug!(key = %id.short(), "remembered key");
        Ok(())
    }

    /// The id of the last used key.
    ///
    /// Fails with `NoKeyFound` if no key was recorded. If several entries
    /// exist, which one is returned is unspecified.
    pub async fn key(&self) -> Result<Id> {
        let dir = self.key_dir()?;
        let names = read_dir_names(&dir).await?;
        let name = names.first().ok_or(CacheError::NoKeyFound)?;
        Id::parse(name).map_err(|e| CacheError::InvalidId(e.to_string()))
    }
}
