//! repocache-rs - A local disk cache in front of a content-addressed
//! repository backend.

pub mod backend;
pub mod caches;
pub mod cli;
pub mod config;
pub mod repo;

pub use backend::{Backend, BackendError, FileType, Handle, Id, LocalBackend, MemoryBackend};
pub use caches::{CacheError, CacheLayout, CacheStore, CachedBackend, NoopCache, ObjectCache};
pub use repo::{CacheOptions, Repo, RepoError, RepositoryInfo};
