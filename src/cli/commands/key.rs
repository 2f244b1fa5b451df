//! Key hint subcommands.

use clap::{Args, Subcommand};

use crate::backend::Id;
use crate::cli::command_context::CommandContext;
use crate::cli::{CliError, OutputSink, Result};

/// Key hint subcommands.
#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Print the id of the last used key.
    Get(GetArgs),

    /// Record the id of the last used key.
    Set(SetArgs),
}

impl KeyCommand {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        match self {
            KeyCommand::Get(args) => args.run(ctx).await,
            KeyCommand::Set(args) => args.run(ctx).await,
        }
    }
}

fn caching_disabled() -> CliError {
    CliError::Other("caching is disabled (--no-cache)".to_string())
}

/// Arguments for the key get command.
#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub output: OutputSink,
}

impl GetArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let repo = ctx.open_repo().await?;
        let store = repo.cache_store().ok_or_else(caching_disabled)?;

        let id = store.key().await?;
        self.output.write_str(&id.to_string()).await?;
        Ok(())
    }
}

/// Arguments for the key set command.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Key id, as 64 hex characters.
    pub id: Id,
}

impl SetArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let repo = ctx.open_repo().await?;
        if !repo.remember_key(&self.id).await? {
            return Err(caching_disabled());
        }
        Ok(())
    }
}
