//! Local disk cache for repository objects.
//!
//! ## Architecture
//!
//! 1. **CacheStore** - Per-repository directory of mirrored objects
//!    - [`CacheLayout`] - Which types are cached and where they live
//!    - Format version marker shared by all repositories under one root
//!    - Key registry remembering the last used key id
//!
//! 2. **ObjectCache** - Interface the decorator talks to
//!    - [`CacheStore`] - Filesystem-backed implementation
//!    - [`NoopCache`] - Used when caching is disabled
//!
//! 3. **CachedBackend** - A [`Backend`](crate::backend::Backend) wrapper
//!    that serves reads from the cache and keeps it in sync on writes

mod cache_dirs;
mod cache_store;
mod cached_backend;
mod error;
mod key_registry;
mod layout;

pub use cache_dirs::{CACHE_DIR_NAME, default_cache_dir};
pub use cache_store::{CACHE_VERSION, CacheStore, NoopCache, ObjectCache};
pub use cached_backend::CachedBackend;
pub use error::{CacheError, Result};
pub use layout::{CacheLayout, DEFAULT_CACHEABLE, default_subdir};
