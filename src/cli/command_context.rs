//! Shared state for running a command: resolved configuration and the
//! cancellation token tied to Ctrl-C.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::LocalBackend;
use crate::cli::{CliError, GlobalArgs, Result};
use crate::config::{Config, read_config};
use crate::repo::{CacheOptions, Repo};

/// Everything a command handler needs besides its own arguments.
pub struct CommandContext {
    config: Config,
    cancel: CancellationToken,
}

impl CommandContext {
    /// Read the layered configuration and apply the global flags on top.
    pub fn new(global: &GlobalArgs, cancel: CancellationToken) -> Result<Self> {
        let result = read_config(&global.to_config_source())?;
        for warning in &result.warnings {
            warn!("{}", warning);
        }

        let mut config = result.config;
        global.apply_to(&mut config);
        debug!(?config, "resolved configuration");

        Ok(Self { config, cancel })
    }

    #[cfg(test)]
    pub(crate) fn from_config(config: Config) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The repository path from `--repository` or `repository.path`.
    pub fn repository_path(&self) -> Result<&Path> {
        self.config
            .repository
            .path
            .as_deref()
            .ok_or(CliError::NoRepository)
    }

    /// Open the configured repository through the cache.
    pub async fn open_repo(&self) -> Result<Repo<LocalBackend>> {
        let backend = LocalBackend::open(self.repository_path()?).await?;
        let options = CacheOptions::from(&self.config.cache);
        Ok(Repo::open(Arc::new(backend), &options, &self.cancel).await?)
    }
}
