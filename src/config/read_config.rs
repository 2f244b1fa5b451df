//! Configuration file reading and parsing.
//!
//! This module handles locating, reading, and parsing INI-format configuration files,
//! with support for layered overrides.

use std::env;
use std::path::{Path, PathBuf};

use configparser::ini::Ini;
use thiserror::Error;

use super::{CacheConfig, Config, RepositoryConfig};
use crate::backend::{FileType, ParseError};
use crate::caches::DEFAULT_CACHEABLE;

// =============================================================================
// Constants - Default Values
// =============================================================================

const DEFAULT_CACHE_NO_CACHE: bool = false;

const ENV_CONFIG_FILE: &str = "RCACHE_CONFIG_FILE";
const DEFAULT_CONFIG_FILENAME: &str = ".rcacheconfig";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid boolean '{value}' for key '{key}'")]
    InvalidBoolean { key: String, value: String },

    #[error("invalid value for key '{key}': {source}")]
    InvalidFileType {
        key: String,
        #[source]
        source: ParseError,
    },

    #[error("invalid override key '{key}': {message}")]
    InvalidOverrideKey { key: String, message: String },

    #[error("invalid override '{0}': expected key=value")]
    InvalidOverride(String),
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// ConfigSource
// =============================================================================

/// Specifies how to locate and layer configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Explicit config file path from CLI. If specified and doesn't exist, error.
    /// If None, fall back to RCACHE_CONFIG_FILE env var, then ~/.rcacheconfig.
    pub config_file: Option<PathBuf>,

    /// Additional override config file (layered on top of base config).
    pub override_file: Option<PathBuf>,

    /// Individual key=value overrides (applied last).
    /// Keys use dot-notation: "cache.dir", "repository.path"
    pub overrides: Vec<(String, String)>,
}

/// Split a `key=value` override string.
pub fn parse_override(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidOverride(s.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::InvalidOverride(s.to_string()));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

// =============================================================================
// Value Parsing
// =============================================================================

/// Parse a boolean value.
fn parse_bool(ini: &Ini, section: &str, key: &str, default: bool) -> Result<bool> {
    match ini.get(section, key) {
        None => Ok(default),
        Some(v) => parse_bool_value(key, &v),
    }
}

fn parse_bool_value(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBoolean {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parse a comma-separated list of file types, dropping duplicates.
fn parse_file_types(key: &str, s: &str) -> Result<Vec<FileType>> {
    let mut types = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let t: FileType = part.parse().map_err(|source| ConfigError::InvalidFileType {
            key: key.to_string(),
            source,
        })?;
        if !types.contains(&t) {
            types.push(t);
        }
    }
    Ok(types)
}

// =============================================================================
// Config File Resolution
// =============================================================================

/// Information about how the config file was resolved.
#[derive(Debug)]
pub struct ResolvedConfigFile {
    /// The path to the config file, if one was found.
    pub path: Option<PathBuf>,
    /// Warning message if env var pointed to nonexistent file.
    pub warning: Option<String>,
}

/// Resolve which config file to use based on the ConfigSource and environment.
fn resolve_config_file(source: &ConfigSource) -> Result<ResolvedConfigFile> {
    resolve_config_file_with(
        source,
        env::var(ENV_CONFIG_FILE).ok(),
        dirs::home_dir(),
    )
}

fn resolve_config_file_with(
    source: &ConfigSource,
    env_path: Option<String>,
    home: Option<PathBuf>,
) -> Result<ResolvedConfigFile> {
    // If explicit path provided, it must exist
    if let Some(ref path) = source.config_file {
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path.clone()),
                warning: None,
            });
        } else {
            return Err(ConfigError::FileNotFound(path.clone()));
        }
    }

    // Check environment variable
    if let Some(env_path) = env_path {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(path),
                warning: None,
            });
        } else {
            // Warn but continue with defaults
            return Ok(ResolvedConfigFile {
                path: None,
                warning: Some(format!(
                    "config file specified by {} does not exist: {}",
                    ENV_CONFIG_FILE, env_path
                )),
            });
        }
    }

    // Check ~/.rcacheconfig
    if let Some(home) = home {
        let default_path = home.join(DEFAULT_CONFIG_FILENAME);
        if default_path.exists() {
            return Ok(ResolvedConfigFile {
                path: Some(default_path),
                warning: None,
            });
        }
    }

    Ok(ResolvedConfigFile {
        path: None,
        warning: None,
    })
}

// =============================================================================
// Default Config
// =============================================================================

/// Create a Config with all default values.
fn default_config() -> Config {
    Config {
        cache: CacheConfig {
            dir: None,
            no_cache: DEFAULT_CACHE_NO_CACHE,
            cacheable: DEFAULT_CACHEABLE.to_vec(),
        },
        repository: RepositoryConfig::default(),
    }
}

// =============================================================================
// INI Parsing
// =============================================================================

/// Apply an INI file's contents to a Config, layering on top of existing values.
fn apply_ini_to_config(config: &mut Config, ini: &Ini) -> Result<()> {
    // [cache] section
    if let Some(dir) = ini.get("cache", "dir") {
        config.cache.dir = Some(PathBuf::from(dir));
    }
    config.cache.no_cache = parse_bool(ini, "cache", "no-cache", config.cache.no_cache)?;
    if let Some(cacheable) = ini.get("cache", "cacheable") {
        config.cache.cacheable = parse_file_types("cacheable", &cacheable)?;
    }

    // [repository] section
    if let Some(path) = ini.get("repository", "path") {
        config.repository.path = Some(PathBuf::from(path));
    }

    Ok(())
}

/// Load and parse an INI file.
fn load_ini(path: &Path) -> Result<Ini> {
    let mut ini = Ini::new();
    ini.load(path).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e,
    })?;
    Ok(ini)
}

// =============================================================================
// Override Application
// =============================================================================

/// Apply a single key=value override to the config.
fn apply_override(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let parts: Vec<&str> = key.splitn(2, '.').collect();

    match parts.as_slice() {
        // cache.dir, cache.no_cache, cache.cacheable
        ["cache", param] => apply_cache_override(config, param, value),

        // repository.path
        ["repository", param] => apply_repository_override(config, param, value),

        _ => Err(ConfigError::InvalidOverrideKey {
            key: key.to_string(),
            message: "unrecognized key format".to_string(),
        }),
    }
}

fn apply_cache_override(config: &mut Config, param: &str, value: &str) -> Result<()> {
    match param {
        "dir" => {
            config.cache.dir = Some(PathBuf::from(value));
            Ok(())
        }
        "no_cache" | "no-cache" => {
            config.cache.no_cache = parse_bool_value(param, value)?;
            Ok(())
        }
        "cacheable" => {
            config.cache.cacheable = parse_file_types(param, value)?;
            Ok(())
        }
        _ => Err(ConfigError::InvalidOverrideKey {
            key: format!("cache.{}", param),
            message: "unknown parameter".to_string(),
        }),
    }
}

fn apply_repository_override(config: &mut Config, param: &str, value: &str) -> Result<()> {
    match param {
        "path" => {
            config.repository.path = Some(PathBuf::from(value));
            Ok(())
        }
        _ => Err(ConfigError::InvalidOverrideKey {
            key: format!("repository.{}", param),
            message: "unknown parameter".to_string(),
        }),
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

/// Result of reading configuration, including any warnings.
#[derive(Debug)]
pub struct ConfigResult {
    /// The parsed configuration.
    pub config: Config,
    /// Any warnings generated during config loading.
    pub warnings: Vec<String>,
}

/// Read and parse configuration from the specified sources.
///
/// Configuration is layered in this order:
/// 1. Built-in defaults
/// 2. Base config file (from CLI, env var, or ~/.rcacheconfig)
/// 3. Override config file (if specified)
/// 4. Individual overrides (applied last)
pub fn read_config(source: &ConfigSource) -> Result<ConfigResult> {
    read_config_from(source, resolve_config_file(source)?)
}

fn read_config_from(source: &ConfigSource, resolved: ResolvedConfigFile) -> Result<ConfigResult> {
    let mut warnings = Vec::new();
    let mut config = default_config();

    if let Some(warning) = resolved.warning {
        warnings.push(warning);
    }
    if let Some(ref path) = resolved.path {
        let ini = load_ini(path)?;
        apply_ini_to_config(&mut config, &ini)?;
    }

    if let Some(ref override_path) = source.override_file {
        if !override_path.exists() {
            return Err(ConfigError::FileNotFound(override_path.clone()));
        }
        let ini = load_ini(override_path)?;
        apply_ini_to_config(&mut config, &ini)?;
    }

    for (key, value) in &source.overrides {
        apply_override(&mut config, key, value)?;
    }

    Ok(ConfigResult { config, warnings })
}

// =============================================================================
// Tests
// =============================================================================
