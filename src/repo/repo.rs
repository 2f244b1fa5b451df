//! Opening a repository and wiring the local cache in front of its backend.
//!
//! The [`Repo`] struct reads the repository identity from the backend, opens
//! the cache for that identity and wraps the backend in a [`CachedBackend`].

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{Backend, BackendError, Handle, Id, reader_from_bytes};
use crate::caches::{
    CacheError, CacheLayout, CacheStore, CachedBackend, NoopCache, ObjectCache,
};
use crate::config::CacheConfig;

use super::repository_info::{REPO_VERSION, RepositoryInfo};

// =============================================================================
// Error Types
// =============================================================================

/// Error type for repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The backend holds no repository config.
    #[error("repository at {0} is not initialized")]
    NotInitialized(String),

    /// The repository is already initialized.
    #[error("repository at {0} is already initialized")]
    AlreadyInitialized(String),

    #[error("invalid repository config: {0}")]
    InvalidInfo(#[from] serde_json::Error),

    #[error("unsupported repository version {0}")]
    UnsupportedVersion(u32),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;

// =============================================================================
// Cache Options
// =============================================================================

/// How the cache in front of a repository is set up.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// Cache root. `None` means the platform cache directory.
    pub dir: Option<PathBuf>,
    pub no_cache: bool,
    pub layout: CacheLayout,
}

impl From<&CacheConfig> for CacheOptions {
    fn from(config: &CacheConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            no_cache: config.no_cache,
            layout: config.layout(),
        }
    }
}

// =============================================================================
// Repo
// =============================================================================

/// An open repository whose backend is fronted by the local cache.
pub struct Repo<B: Backend> {
    info: RepositoryInfo,
    backend: CachedBackend<B>,
    cache_store: Option<Arc<CacheStore>>,
}

impl<B: Backend> Repo<B> {
    /// Write a fresh repository config to `backend`.
    ///
    /// Fails with `AlreadyInitialized` if the backend already holds one.
    pub async fn init(backend: &B, cancel: &CancellationToken) -> Result<RepositoryInfo> {
        let h = Handle::config();
        match backend.stat(cancel, &h).await {
            Ok(_) => return Err(RepoError::AlreadyInitialized(backend.location())),
            Err(e) if backend.is_not_exist(&e) => {}
            Err(e) => return Err(e.into()),
        }

        let info = RepositoryInfo::generate();
        backend
            .save(cancel, &h, reader_from_bytes(info.to_json()?))
            .await?;
        debug!(id = %info.id, location = %backend.location(), "initialized repository");
        Ok(info)
    }

    /// Open the repository stored in `backend`.
    ///
    /// If the cache cannot be opened the repository is still usable, with
    /// caching disabled. An invalid layout is a configuration mistake and
    /// fails the open.
    pub async fn open(
        backend: Arc<B>,
        options: &CacheOptions,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let info = read_info(backend.as_ref(), cancel).await?;

        let cache_store = if options.no_cache {
            debug!("caching disabled");
            None
        } else {
            let opened =
                CacheStore::open(&info.id, options.dir.as_deref(), options.layout.clone()).await;
            match opened {
                Ok(store) => Some(Arc::new(store)),
                Err(e @ CacheError::InvalidLayout(_)) => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, "unable to open cache, continuing without it");
                    None
                }
            }
        };

        let cache: Arc<dyn ObjectCache> = match &cache_store {
            Some(store) => store.clone(),
            None => Arc::new(NoopCache),
        };

        Ok(Self {
            info,
            backend: CachedBackend::new(backend, cache),
            cache_store,
        })
    }

    pub fn info(&self) -> &RepositoryInfo {
        &self.info
    }

    /// The cache-decorated backend.
    pub fn backend(&self) -> &CachedBackend<B> {
        &self.backend
    }

    /// The cache store, or `None` when caching is disabled.
    pub fn cache_store(&self) -> Option<&Arc<CacheStore>> {
        self.cache_store.as_ref()
    }

    /// The key that last unlocked this repository, if one was recorded.
    pub async fn key_hint(&self) -> Option<Id> {
        let store = self.cache_store.as_ref()?;
        match store.key().await {
            Ok(id) => Some(id),
            Err(CacheError::NoKeyFound) => None,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable key hint");
                None
            }
        }
    }

    /// Record `id` as the key hint. Returns false when caching is disabled.
    pub async fn remember_key(&self, id: &Id) -> Result<bool> {
        match &self.cache_store {
            Some(store) => {
                store.set_key(id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn close(&self) -> Result<()> {
        Ok(self.backend.close().await?)
    }
}

/// Read and check the repository config.
async fn read_info<B: Backend>(
    backend: &B,
    cancel: &CancellationToken,
) -> Result<RepositoryInfo> {
    let h = Handle::config();
    let mut rd = match backend.load(cancel, &h, 0, 0).await {
        Ok(rd) => rd,
        Err(e) if backend.is_not_exist(&e) => {
            return Err(RepoError::NotInitialized(backend.location()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut data = Vec::new();
    rd.read_to_end(&mut data)
        .await
        .map_err(BackendError::from)?;

    let info = RepositoryInfo::from_json(&data)?;
    if info.version != REPO_VERSION {
        return Err(RepoError::UnsupportedVersion(info.version));
    }
    Ok(info)
}

// =============================================================================
// Tests
// =============================================================================
