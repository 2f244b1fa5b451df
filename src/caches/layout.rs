//! Cache layout policy: which object types are mirrored and where they live.

use std::collections::{BTreeMap, BTreeSet};

use crate::backend::FileType;

use super::error::{CacheError, Result};

/// Types mirrored by [`CacheLayout::default`].
pub const DEFAULT_CACHEABLE: [FileType; 2] = [FileType::Snapshot, FileType::Index];

/// The conventional subdirectory name for a file type.
pub fn default_subdir(file_type: FileType) -> &'static str {
    match file_type {
        FileType::Data => "data",
        FileType::Key => "keys",
        FileType::Lock => "locks",
        FileType::Snapshot => "snapshots",
        FileType::Index => "index",
        FileType::Config => "config",
    }
}

/// Describes the directory layout of a cache store.
///
/// Maps each type to a subdirectory of the repository's cache directory and
/// records which types may be mirrored. The [`FileType::Key`] entry is
/// reserved for the key registry and is never cacheable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    subdirs: BTreeMap<FileType, String>,
    cacheable: BTreeSet<FileType>,
}

impl Default for CacheLayout {
    fn default() -> Self {
        Self::with_cacheable_types(DEFAULT_CACHEABLE)
    }
}

impl CacheLayout {
    /// An empty layout. Add entries with [`with_subdir`](Self::with_subdir)
    /// and [`with_cacheable`](Self::with_cacheable).
    pub fn empty() -> Self {
        Self {
            subdirs: BTreeMap::new(),
            cacheable: BTreeSet::new(),
        }
    }

    /// A layout caching the given types, using the conventional directory
    /// names, plus the key registry directory.
    pub fn with_cacheable_types(types: impl IntoIterator<Item = FileType>) -> Self {
        let mut layout =
            Self::empty().with_subdir(FileType::Key, default_subdir(FileType::Key));
        for t in types {
            layout = layout
                .with_subdir(t, default_subdir(t))
                .with_cacheable(t);
        }
        layout
    }

    /// Set the subdirectory name for a type.
    pub fn with_subdir(mut self, file_type: FileType, name: impl Into<String>) -> Self {
        self.subdirs.insert(file_type, name.into());
        self
    }

    /// Mark a type as cacheable.
    pub fn with_cacheable(mut self, file_type: FileType) -> Self {
        self.cacheable.insert(file_type);
        self
    }

    /// The subdirectory name for a type, if it has one.
    pub fn subdir(&self, file_type: FileType) -> Option<&str> {
        self.subdirs.get(&file_type).map(String::as_str)
    }

    /// All configured subdirectory names.
    pub fn subdirs(&self) -> impl Iterator<Item = &str> {
        self.subdirs.values().map(String::as_str)
    }

    /// Whether objects of this type may be mirrored.
    pub fn is_cacheable(&self, file_type: FileType) -> bool {
        self.cacheable.contains(&file_type)
    }

    /// The cacheable types, in a stable order.
    pub fn cacheable(&self) -> impl Iterator<Item = FileType> + '_ {
        self.cacheable.iter().copied()
    }

    /// The key registry subdirectory.
    pub fn key_dir(&self) -> Option<&str> {
        self.subdir(FileType::Key)
    }

    /// Check that the layout is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.key_dir().is_none() {
            return Err(CacheError::InvalidLayout(
                "no subdirectory for the key registry".to_string(),
            ));
        }

        if self.is_cacheable(FileType::Key) {
            return Err(CacheError::InvalidLayout(
                "key files are kept in the key registry and cannot be cacheable".to_string(),
            ));
        }

        for t in &self.cacheable {
            if !self.subdirs.contains_key(t) {
                return Err(CacheError::InvalidLayout(format!(
                    "cacheable type '{}' has no subdirectory",
                    t
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for (t, name) in &self.subdirs {
            if !is_plain_component(name) {
                return Err(CacheError::InvalidLayout(format!(
                    "subdirectory '{}' for type '{}' is not a plain directory name",
                    name, t
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(CacheError::InvalidLayout(format!(
                    "subdirectory '{}' is used by more than one type",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Whether `name` can be used as a single path component inside the cache.
///
/// Leading dots are rejected so names never clash with temp files or the
/// `version` marker's siblings.
pub(crate) fn is_plain_component(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\', '\0'])
}
