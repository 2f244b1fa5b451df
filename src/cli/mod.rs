//! Command-line interface for repocache.

pub mod args;
mod command_context;
mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use command_context::CommandContext;

pub use args::{GlobalArgs, InputSource, ObjectArgs, OutputSink};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during CLI execution.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument processing error.
    #[error("{0}")]
    Args(#[from] args::ArgsError),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] crate::config::ConfigError),

    /// Repository error.
    #[error("{0}")]
    Repo(#[from] crate::repo::RepoError),

    /// Backend error.
    #[error("{0}")]
    Backend(#[from] crate::backend::BackendError),

    /// Cache error.
    #[error("{0}")]
    Cache(#[from] crate::caches::CacheError),

    /// No repository was given on the command line or in the config.
    #[error("no repository specified (use --repository or set repository.path)")]
    NoRepository,

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

// =============================================================================
// CLI Definition
// =============================================================================

/// rcache - Access a repository through a local object cache.
#[derive(Parser, Debug)]
#[command(name = "rcache", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new local repository.
    Init(commands::init::InitArgs),

    /// Write an object's content to stdout or a file.
    Cat(commands::object::CatArgs),

    /// Store an object from stdin or a file.
    Put(commands::object::PutArgs),

    /// Show an object's size.
    Stat(commands::object::StatArgs),

    /// Delete an object.
    Rm(commands::object::RmArgs),

    /// List the objects of a type.
    List(commands::object::ListArgs),

    /// Key hint operations.
    Key {
        #[command(subcommand)]
        command: commands::key::KeyCommand,
    },

    /// Cache inspection.
    Cache {
        #[command(subcommand)]
        command: commands::cache::CacheCommand,
    },
}

// =============================================================================
// CLI Execution
// =============================================================================

impl Cli {
    /// Parse command-line arguments and return the CLI instance.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        logging::init_tracing(self.global.verbose);

        let cancel = CancellationToken::new();
        let ctx = CommandContext::new(&self.global, cancel.clone())?;

        let signal_task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling");
                cancel.cancel();
            }
        });

        let result = match self.command {
            Command::Init(args) => args.run(&ctx).await,
            Command::Cat(args) => args.run(&ctx).await,
            Command::Put(args) => args.run(&ctx).await,
            Command::Stat(args) => args.run(&ctx).await,
            Command::Rm(args) => args.run(&ctx).await,
            Command::List(args) => args.run(&ctx).await,
            Command::Key { command } => command.run(&ctx).await,
            Command::Cache { command } => command.run(&ctx).await,
        };

        signal_task.abort();
        result
    }
}

/// Main entry point for the CLI.
pub async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cat() {
        let cli = Cli::try_parse_from([
            "rcache",
            "--repository",
            "/srv/repo",
            "cat",
            "snapshots",
            "abc",
            "--offset",
            "4",
            "-o",
            "/tmp/out",
        ])
        .unwrap();

        assert_eq!(
            cli.global.repository.as_deref(),
            Some(std::path::Path::new("/srv/repo"))
        );
        let Command::Cat(args) = cli.command else {
            panic!("expected cat");
        };
        assert_eq!(args.object.file_type, crate::backend::FileType::Snapshot);
        assert_eq!(args.object.name, "abc");
        assert_eq!(args.offset, 4);
        assert_eq!(args.length, 0);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "rcache",
            "key",
            "get",
            "--no-cache",
            "-v",
            "--config",
            "cache.dir=/c",
        ])
        .unwrap();
        assert!(cli.global.no_cache);
        assert!(cli.global.verbose);
        assert_eq!(
            cli.global.config_overrides,
            vec![("cache.dir".to_string(), "/c".to_string())]
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Cli::try_parse_from(["rcache", "list", "blobs"]).is_err());
        assert!(Cli::try_parse_from(["rcache", "key", "set", "zz"]).is_err());
        assert!(Cli::try_parse_from(["rcache", "--config", "novalue", "init"]).is_err());
    }
}
