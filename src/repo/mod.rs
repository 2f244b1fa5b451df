//! Repository access through the local cache.
//!
//! This module provides the [`Repo`] struct which reads a repository's
//! identity and fronts its backend with a [`CachedBackend`](crate::caches::CachedBackend).

#[allow(clippy::module_inception)]
mod repo;
mod repository_info;

pub use repo::{CacheOptions, Repo, RepoError, Result};
pub use repository_info::{REPO_VERSION, RepositoryInfo};
