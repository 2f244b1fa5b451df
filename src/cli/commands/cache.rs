//! Cache inspection subcommands.

use clap::{Args, Subcommand};

use crate::caches::CACHE_VERSION;
use crate::cli::command_context::CommandContext;
use crate::cli::{CliError, OutputSink, Result};

/// Cache subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Show the cache location, format version and cached object counts.
    Info(InfoArgs),
}

impl CacheCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        match self {
            CacheCommand::Info(args) => args.run(ctx).await,
        }
    }
}

/// Arguments for the cache info command.
#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub output: OutputSink,
}

impl InfoArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let repo = ctx.open_repo().await?;
        let store = repo
            .cache_store()
            .ok_or_else(|| CliError::Other("caching is disabled (--no-cache)".to_string()))?;

        let mut lines = vec![
            format!("path: {}", store.path().display()),
            format!("version: {}", CACHE_VERSION),
        ];
        for file_type in store.layout().cacheable() {
            let count = store.list(file_type).await?.len();
            lines.push(format!("{}: {}", file_type, count));
        }
        if let Some(id) = repo.key_hint().await {
            lines.push(format!("key: {}", id));
        }

        self.output.write_str(&lines.join("\n")).await?;
        Ok(())
    }
}
