//! Configuration types for repocache-rs.
//!
//! This module defines the structures used to represent application configuration
//! as parsed from an INI-format config file.

use std::path::PathBuf;

use crate::backend::FileType;
use crate::caches::CacheLayout;

// =============================================================================
// Config Sections
// =============================================================================

/// [cache] section - local object cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Cache root. `None` means the platform cache directory.
    pub dir: Option<PathBuf>,
    pub no_cache: bool,
    /// Object types mirrored in the cache.
    pub cacheable: Vec<FileType>,
}

impl CacheConfig {
    /// The cache layout described by this section.
    pub fn layout(&self) -> CacheLayout {
        CacheLayout::with_cacheable_types(self.cacheable.iter().copied())
    }
}

/// [repository] section - the repository to operate on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub path: Option<PathBuf>,
}

// =============================================================================
// Top-Level Config
// =============================================================================

/// Complete application configuration as parsed from config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub cache: CacheConfig,
    pub repository: RepositoryConfig,
}
