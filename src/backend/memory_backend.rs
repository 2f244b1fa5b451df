use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use super::handle::{FileType, Handle};
use super::repo_backend::{
    Backend, BackendError, FileInfo, ObjectReader, Result, cancellable, reader_from_bytes,
};

/// An in-memory implementation of `Backend`, intended primarily for testing.
///
/// Besides the `Backend` operations it exposes direct accessors so tests can
/// inspect or tamper with the stored objects behind a wrapper's back.
pub struct MemoryBackend {
    objects: RwLock<HashMap<Handle, Vec<u8>>>,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            loads: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    /// Get a copy of a stored object.
    pub fn object(&self, h: &Handle) -> Option<Vec<u8>> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        objects.get(h).cloned()
    }

    /// Store an object without going through `save`.
    pub fn insert_object(&self, h: Handle, data: impl Into<Vec<u8>>) {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        objects.insert(h, data.into());
    }

    /// Delete an object without going through `remove`.
    pub fn take_object(&self, h: &Handle) -> Option<Vec<u8>> {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        objects.remove(h)
    }

    /// Number of `load` calls that reached this backend.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    /// Number of `save` calls that reached this backend.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Select `[offset, offset + length)` from `data`, reading to the end when
/// `length` is zero. Ranges running past the end are truncated.
fn slice_range(h: &Handle, data: &[u8], length: u64, offset: u64) -> Result<Vec<u8>> {
    let size = data.len() as u64;
    if offset > size {
        return Err(BackendError::Other(format!(
            "offset {} exceeds size {} of {}",
            offset, size, h
        )));
    }

    let end = if length == 0 {
        size
    } else {
        offset.saturating_add(length).min(size)
    };
    Ok(data[offset as usize..end as usize].to_vec())
}

impl Backend for MemoryBackend {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn save(
        &self,
        cancel: &CancellationToken,
        h: &Handle,
        mut rd: ObjectReader,
    ) -> Result<()> {
        self.saves.fetch_add(1, Ordering::Relaxed);
        let data = cancellable(cancel, async {
            let mut buf = Vec::new();
            rd.read_to_end(&mut buf).await?;
            Ok(buf)
        })
        .await?;

        self.insert_object(h.clone(), data);
        Ok(())
    }

    async fn load(
        &self,
        cancel: &CancellationToken,
        h: &Handle,
        length: u64,
        offset: u64,
    ) -> Result<ObjectReader> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        cancellable(cancel, async {
            let data = self
                .object(h)
                .ok_or_else(|| BackendError::NotFound(h.clone()))?;
            let slice = slice_range(h, &data, length, offset)?;
            Ok(reader_from_bytes(slice))
        })
        .await
    }

    async fn stat(&self, cancel: &CancellationToken, h: &Handle) -> Result<FileInfo> {
        cancellable(cancel, async {
            let data = self
                .object(h)
                .ok_or_else(|| BackendError::NotFound(h.clone()))?;
            Ok(FileInfo {
                name: h.name.clone(),
                size: data.len() as u64,
            })
        })
        .await
    }

    async fn remove(&self, cancel: &CancellationToken, h: &Handle) -> Result<()> {
        cancellable(cancel, async {
            self.take_object(h)
                .map(|_| ())
                .ok_or_else(|| BackendError::NotFound(h.clone()))
        })
        .await
    }

    async fn list(&self, cancel: &CancellationToken, file_type: FileType) -> Result<Vec<String>> {
        cancellable(cancel, async {
            let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
            let mut names: Vec<String> = objects
                .keys()
                .filter(|h| h.file_type == file_type)
                .map(|h| h.name.clone())
                .collect();
            names.sort();
            Ok(names)
        })
        .await
    }

    fn is_not_exist(&self, err: &BackendError) -> bool {
        matches!(err, BackendError::NotFound(_))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
