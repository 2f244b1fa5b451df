//! Command-line argument definitions and helpers.

use std::path::PathBuf;

use clap::Args;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::backend::{FileType, Handle, ObjectReader};
use crate::config::{Config, ConfigSource, parse_override};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during argument processing.
#[derive(Debug, Error)]
pub enum ArgsError {
    /// I/O error reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for argument operations.
pub type Result<T> = std::result::Result<T, ArgsError>;

// =============================================================================
// Global Arguments
// =============================================================================

/// Global arguments that apply to all commands.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Path to the main configuration file.
    #[arg(long = "config-file", global = true)]
    pub config_file: Option<PathBuf>,

    /// Path to the configuration overrides file.
    #[arg(long = "config-file-overrides", global = true)]
    pub config_file_overrides: Option<PathBuf>,

    /// Configuration overrides in the form name=value.
    #[arg(long = "config", value_parser = parse_config_override, global = true)]
    pub config_overrides: Vec<(String, String)>,

    /// Path of the local repository. Overrides `repository.path`.
    #[arg(long = "repository", short = 'r', global = true)]
    pub repository: Option<PathBuf>,

    /// Cache root directory. Overrides `cache.dir`.
    #[arg(long = "cache-dir", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Disable caching.
    #[arg(long = "no-cache", global = true)]
    pub no_cache: bool,

    /// Log debug output to stderr.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Convert to a ConfigSource for reading configuration.
    pub fn to_config_source(&self) -> ConfigSource {
        ConfigSource {
            config_file: self.config_file.clone(),
            override_file: self.config_file_overrides.clone(),
            overrides: self.config_overrides.clone(),
        }
    }

    /// Apply the flags that take precedence over any configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(path) = &self.repository {
            config.repository.path = Some(path.clone());
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = Some(dir.clone());
        }
        if self.no_cache {
            config.cache.no_cache = true;
        }
    }
}

/// Parse a config override from "name=value" format.
fn parse_config_override(s: &str) -> std::result::Result<(String, String), String> {
    parse_override(s).map_err(|e| e.to_string())
}

// =============================================================================
// Object Arguments
// =============================================================================

/// Identifies one object in the repository.
#[derive(Args, Debug, Clone)]
pub struct ObjectArgs {
    /// Object type (data, key, lock, snapshot, index, config).
    #[arg(value_name = "TYPE")]
    pub file_type: FileType,

    /// Object name.
    pub name: String,
}

impl ObjectArgs {
    pub fn handle(&self) -> Handle {
        match self.file_type {
            FileType::Config => Handle::config(),
            file_type => Handle::new(file_type, self.name.clone()),
        }
    }
}

// =============================================================================
// Input/Output Helpers
// =============================================================================

/// Helper for commands that read object content from a file or stdin.
#[derive(Args, Debug, Default)]
pub struct InputSource {
    /// Read input from this file instead of stdin.
    #[arg(id = "input_file", short = 'f', long = "input-file")]
    pub file: Option<PathBuf>,
}

impl InputSource {
    /// Open the input as a stream.
    pub async fn open(&self) -> Result<ObjectReader> {
        match &self.file {
            Some(path) => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::new(file))
            }
            None => Ok(Box::new(tokio::io::stdin())),
        }
    }
}

/// Helper for commands that write output to a file or stdout.
#[derive(Args, Debug, Default)]
pub struct OutputSink {
    /// Write output to this file instead of stdout.
    #[arg(id = "output_file", short = 'o', long = "output-file")]
    pub file: Option<PathBuf>,
}

impl OutputSink {
    /// Write a string value to the output, followed by a newline.
    pub async fn write_str(&self, value: &str) -> Result<()> {
        match &self.file {
            Some(path) => {
                tokio::fs::write(path, format!("{}\n", value)).await?;
            }
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(value.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }
        Ok(())
    }

    /// Stream the contents of `rd` to the output unchanged.
    pub async fn copy_from(&self, mut rd: ObjectReader) -> Result<u64> {
        let copied = match &self.file {
            Some(path) => {
                let mut file = tokio::fs::File::create(path).await?;
                let copied = tokio::io::copy(&mut rd, &mut file).await?;
                file.flush().await?;
                copied
            }
            None => {
                let mut stdout = tokio::io::stdout();
                let copied = tokio::io::copy(&mut rd, &mut stdout).await?;
                stdout.flush().await?;
                copied
            }
        };
        Ok(copied)
    }
}
