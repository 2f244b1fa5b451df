//! Object subcommands: read, write, inspect and delete single objects.

use clap::Args;
use tracing::debug;

use crate::backend::{Backend, FileType};
use crate::cli::command_context::CommandContext;
use crate::cli::{InputSource, ObjectArgs, OutputSink, Result};

// =============================================================================
// Cat
// =============================================================================

/// Arguments for the cat command.
#[derive(Args, Debug)]
pub struct CatArgs {
    #[command(flatten)]
    pub object: ObjectArgs,

    /// Skip this many bytes first.
    #[arg(long, default_value_t = 0)]
    pub offset: u64,

    /// Read at most this many bytes (0 reads to the end).
    #[arg(long, default_value_t = 0)]
    pub length: u64,

    #[command(flatten)]
    pub output: OutputSink,
}

impl CatArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let repo = ctx.open_repo().await?;
        let h = self.object.handle();

        let rd = repo
            .backend()
            .load(ctx.cancel(), &h, self.length, self.offset)
            .await?;
        let copied = self.output.copy_from(rd).await?;
        debug!(handle = %h, bytes = copied, "read object");

        repo.close().await?;
        Ok(())
    }
}

// =============================================================================
// Put
// =============================================================================

/// Arguments for the put command.
#[derive(Args, Debug)]
pub struct PutArgs {
    #[command(flatten)]
    pub object: ObjectArgs,

    #[command(flatten)]
    pub input: InputSource,
}

impl PutArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let repo = ctx.open_repo().await?;
        let h = self.object.handle();

        let rd = self.input.open().await?;
        repo.backend().save(ctx.cancel(), &h, rd).await?;

        repo.close().await?;
        Ok(())
    }
}

// =============================================================================
// Stat
// =============================================================================

/// Arguments for the stat command.
#[derive(Args, Debug)]
pub struct StatArgs {
    #[command(flatten)]
    pub object: ObjectArgs,

    #[command(flatten)]
    pub output: OutputSink,
}

impl StatArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let repo = ctx.open_repo().await?;
        let h = self.object.handle();

        let info = repo.backend().stat(ctx.cancel(), &h).await?;
        self.output
            .write_str(&format!("{}\t{}", h, info.size))
            .await?;

        repo.close().await?;
        Ok(())
    }
}

// =============================================================================
// Rm
// =============================================================================

/// Arguments for the rm command.
#[derive(Args, Debug)]
pub struct RmArgs {
    #[command(flatten)]
    pub object: ObjectArgs,
}

impl RmArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let repo = ctx.open_repo().await?;
        repo.backend()
            .remove(ctx.cancel(), &self.object.handle())
            .await?;
        repo.close().await?;
        Ok(())
    }
}

// =============================================================================
// List
// =============================================================================

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Object type to list.
    #[arg(value_name = "TYPE")]
    pub file_type: FileType,

    #[command(flatten)]
    pub output: OutputSink,
}

impl ListArgs {
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let repo = ctx.open_repo().await?;

        let names = repo.backend().list(ctx.cancel(), self.file_type).await?;
        if !names.is_empty() {
            self.output.write_str(&names.join("\n")).await?;
        }

        repo.close().await?;
        Ok(())
    }
}
