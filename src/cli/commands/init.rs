//! The `init` command.

use clap::Args;

use crate::backend::LocalBackend;
use crate::cli::command_context::CommandContext;
use crate::cli::{OutputSink, Result};
use crate::repo::Repo;

/// Arguments for the init command.
#[derive(Args, Debug)]
pub struct InitArgs {
    #[command(flatten)]
    pub output: OutputSink,
}

impl InitArgs {
    /// Create the repository directory and write a fresh repository id.
    pub async fn run(self, ctx: &CommandContext) -> Result<()> {
        let backend = LocalBackend::create(ctx.repository_path()?).await?;
        let info = Repo::init(&backend, ctx.cancel()).await?;
        self.output.write_str(&info.id).await?;
        Ok(())
    }
}
