//! A backend decorator that mirrors cacheable objects in a local cache.
//!
//! The wrapped backend stays authoritative:
//! - reads of cached objects are served locally, everything else falls
//!   through to the backend;
//! - full reads of cacheable objects populate the cache;
//! - writes of cacheable objects go to the cache first, and the cached copy
//!   is what gets sent to the backend;
//! - any "not found" answer from the backend evicts the local copy.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::{
    Backend, BackendError, FileInfo, FileType, Handle, ObjectReader, Result,
};

use super::cache_store::ObjectCache;

/// Wraps a [`Backend`] with an [`ObjectCache`].
pub struct CachedBackend<B: Backend> {
    backend: Arc<B>,
    cache: Arc<dyn ObjectCache>,
}

impl<B: Backend> CachedBackend<B> {
    /// Decorate `backend` with `cache`.
    pub fn new(backend: Arc<B>, cache: Arc<dyn ObjectCache>) -> Self {
        Self { backend, cache }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// The cache mirroring the backend.
    pub fn cache(&self) -> &Arc<dyn ObjectCache> {
        &self.cache
    }

    /// Drop a cached copy, ignoring errors.
    async fn evict(&self, h: &Handle) {
        if let Err(err) = self.cache.remove(h).await {
            if !err.is_not_cached() {
                debug!(handle = %h, error = %err, "failed to evict cached copy");
            }
        }
    }
}

impl<B: Backend> Backend for CachedBackend<B> {
    fn location(&self) -> String {
        self.backend.location()
    }

    async fn save(&self, cancel: &CancellationToken, h: &Handle, rd: ObjectReader) -> Result<()> {
        debug!(handle = %h, "cache save");
        if !self.cache.is_cacheable(h) {
            return self.backend.save(cancel, h, rd).await;
        }

        self.cache.save(h, rd).await?;
        if cancel.is_cancelled() {
            self.evict(h).await;
            return Err(BackendError::Cancelled);
        }

        let rd = self.cache.load(h, 0, 0).await?;
        if let Err(err) = self.backend.save(cancel, h, rd).await {
            // The backend never got the object, so neither should the cache
            // keep it.
            self.evict(h).await;
            return Err(err);
        }
        Ok(())
    }

    async fn load(
        &self,
        cancel: &CancellationToken,
        h: &Handle,
        length: u64,
        offset: u64,
    ) -> Result<ObjectReader> {
        debug!(handle = %h, length, offset, "cache load");
        if self.cache.has(h).await {
            debug!(handle = %h, "returning from cache");
            return Ok(self.cache.load(h, length, offset).await?);
        }

        let rd = match self.backend.load(cancel, h, length, offset).await {
            Ok(rd) => rd,
            Err(err) => {
                if self.backend.is_not_exist(&err) {
                    self.evict(h).await;
                }
                return Err(err);
            }
        };

        if !self.cache.is_cacheable(h) || length != 0 || offset != 0 {
            return Ok(rd);
        }

        self.cache.save(h, rd).await?;
        if cancel.is_cancelled() {
            self.evict(h).await;
            return Err(BackendError::Cancelled);
        }

        Ok(self.cache.load(h, 0, 0).await?)
    }

    async fn stat(&self, cancel: &CancellationToken, h: &Handle) -> Result<FileInfo> {
        debug!(handle = %h, "cache stat");
        let result = self.backend.stat(cancel, h).await;
        if let Err(err) = &result {
            if self.backend.is_not_exist(err) {
                self.evict(h).await;
            }
        }
        result
    }

    async fn remove(&self, cancel: &CancellationToken, h: &Handle) -> Result<()> {
        debug!(handle = %h, "cache remove");
        self.backend.remove(cancel, h).await?;

        match self.cache.remove(h).await {
            Err(err) if err.is_not_cached() => Ok(()),
            result => Ok(result?),
        }
    }

    async fn list(&self, cancel: &CancellationToken, file_type: FileType) -> Result<Vec<String>> {
        self.backend.list(cancel, file_type).await
    }

    fn is_not_exist(&self, err: &BackendError) -> bool {
        self.backend.is_not_exist(err)
    }

    async fn close(&self) -> Result<()> {
        self.backend.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, reader_from_bytes};
    use crate::caches::{CacheError, CacheLayout, CacheStore, NoopCache};
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    struct Fixture {
        _temp_dir: TempDir,
        backend: Arc<MemoryBackend>,
        store: Arc<CacheStore>,
        cached: CachedBackend<MemoryBackend>,
        cancel: CancellationToken,
    }

    async fn fixture() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let store = Arc::new(
            CacheStore::open("repo", Some(temp_dir.path()), CacheLayout::default())
                .await
                .unwrap(),
        );
        let cached = CachedBackend::new(backend.clone(), store.clone());
        Fixture {
            _temp_dir: temp_dir,
            backend,
            store,
            cached,
            cancel: CancellationToken::new(),
        }
    }

    async fn read_all(mut rd: ObjectReader) -> Vec<u8> {
        let mut buf = Vec::new();
        rd.read_to_end(&mut buf).await.unwrap();
        buf
    }

    async fn cached_bytes(store: &CacheStore, h: &Handle) -> Vec<u8> {
        read_all(store.load(h, 0, 0).await.unwrap()).await
    }

    #[tokio::test]
    async fn test_save_writes_cache_and_backend() {
        let f = fixture().await;
        let h = Handle::new(FileType::Snapshot, "snap");

        f.cached
            .save(&f.cancel, &h, reader_from_bytes(b"snapshot".to_vec()))
            .await
            .unwrap();

        assert!(f.store.has(&h).await);
        assert_eq!(f.backend.object(&h).unwrap(), b"snapshot");
        assert_eq!(cached_bytes(&f.store, &h).await, f.backend.object(&h).unwrap());
    }

    #[tokio::test]
    async fn test_save_non_cacheable_skips_cache() {
        let f = fixture().await;
        let h = Handle::new(FileType::Data, "pack");

        f.cached
            .save(&f.cancel, &h, reader_from_bytes(b"payload".to_vec()))
            .await
            .unwrap();

        assert!(!f.store.has(&h).await);
        assert_eq!(f.backend.object(&h).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_load_roundtrip_and_served_from_cache() {
        let f = fixture().await;
        let h = Handle::new(FileType::Index, "idx");

        f.cached
            .save(&f.cancel, &h, reader_from_bytes(b"index block".to_vec()))
            .await
            .unwrap();

        let rd = f.cached.load(&f.cancel, &h, 0, 0).await.unwrap();
        assert_eq!(read_all(rd).await, b"index block");
        let rd = f.cached.load(&f.cancel, &h, 5, 6).await.unwrap();
        assert_eq!(read_all(rd).await, b"block");
        assert_eq!(f.backend.load_count(), 0);
    }

    #[tokio::test]
    async fn test_cached_range_error() {
        let f = fixture().await;
        let h = Handle::new(FileType::Index, "idx");
        f.cached
            .save(&f.cancel, &h, reader_from_bytes(b"short".to_vec()))
            .await
            .unwrap();

        let err = f.cached.load(&f.cancel, &h, 10, 0).await.err().unwrap();
        assert!(matches!(err, BackendError::Cache(CacheError::Range { .. })));
    }

    #[tokio::test]
    async fn test_full_load_populates_cache() {
        let f = fixture().await;
        let h = Handle::new(FileType::Snapshot, "snap");
        f.backend.insert_object(h.clone(), b"from backend".to_vec());

        let rd = f.cached.load(&f.cancel, &h, 0, 0).await.unwrap();
        assert_eq!(read_all(rd).await, b"from backend");
        assert!(f.store.has(&h).await);
        assert_eq!(cached_bytes(&f.store, &h).await, b"from backend");

        // Second load is served locally.
        f.cached.load(&f.cancel, &h, 0, 0).await.unwrap();
        assert_eq!(f.backend.load_count(), 1);
    }

    #[tokio::test]
    async fn test_partial_load_does_not_populate_cache() {
        let f = fixture().await;
        let h = Handle::new(FileType::Snapshot, "snap");
        f.backend.insert_object(h.clone(), b"0123456789".to_vec());

        let rd = f.cached.load(&f.cancel, &h, 3, 1).await.unwrap();
        assert_eq!(read_all(rd).await, b"123");
        assert!(!f.store.has(&h).await);
    }

    #[tokio::test]
    async fn test_non_cacheable_load_bypasses_cache() {
        let f = fixture().await;
        let h = Handle::new(FileType::Data, "pack");
        f.backend.insert_object(h.clone(), b"payload".to_vec());

        let rd = f.cached.load(&f.cancel, &h, 0, 0).await.unwrap();
        assert_eq!(read_all(rd).await, b"payload");
        assert!(!f.store.has(&h).await);
        assert!(f.store.list(FileType::Data).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_miss_on_load() {
        let f = fixture().await;
        let missing = Handle::new(FileType::Index, "missing");
        let kept = Handle::new(FileType::Index, "kept");
        f.store
            .save(&kept, reader_from_bytes(b"index".to_vec()))
            .await
            .unwrap();

        let err = f.cached.load(&f.cancel, &missing, 0, 0).await.err().unwrap();
        assert!(f.cached.is_not_exist(&err));
        assert!(!f.store.has(&missing).await);
        assert!(f.store.has(&kept).await);
    }

    #[tokio::test]
    async fn test_backend_miss_on_stat_evicts() {
        let f = fixture().await;
        let h = Handle::new(FileType::Snapshot, "snap");
        f.cached
            .save(&f.cancel, &h, reader_from_bytes(b"snapshot".to_vec()))
            .await
            .unwrap();

        // Deleted behind the cache's back.
        f.backend.take_object(&h);

        let err = f.cached.stat(&f.cancel, &h).await.unwrap_err();
        assert!(f.cached.is_not_exist(&err));
        assert!(!f.store.has(&h).await);
    }

    #[tokio::test]
    async fn test_stat_is_never_answered_from_cache() {
        let f = fixture().await;
        let h = Handle::new(FileType::Snapshot, "snap");
        f.store
            .save(&h, reader_from_bytes(b"local only".to_vec()))
            .await
            .unwrap();

        assert!(f.cached.stat(&f.cancel, &h).await.is_err());
        f.backend.insert_object(h.clone(), b"remote".to_vec());
        assert_eq!(f.cached.stat(&f.cancel, &h).await.unwrap().size, 6);
    }

    #[tokio::test]
    async fn test_remove_deletes_both() {
        let f = fixture().await;
        let h = Handle::new(FileType::Snapshot, "snap");
        f.cached
            .save(&f.cancel, &h, reader_from_bytes(b"snapshot".to_vec()))
            .await
            .unwrap();

        f.cached.remove(&f.cancel, &h).await.unwrap();
        assert!(!f.store.has(&h).await);
        assert!(f.backend.object(&h).is_none());
    }

    #[tokio::test]
    async fn test_remove_uncached_object() {
        let f = fixture().await;
        let h = Handle::new(FileType::Data, "pack");
        f.backend.insert_object(h.clone(), b"payload".to_vec());

        f.cached.remove(&f.cancel, &h).await.unwrap();
        assert!(f.backend.object(&h).is_none());
    }

    #[tokio::test]
    async fn test_remove_backend_failure_keeps_cache() {
        let f = fixture().await;
        let h = Handle::new(FileType::Snapshot, "snap");
        f.store
            .save(&h, reader_from_bytes(b"local".to_vec()))
            .await
            .unwrap();

        let err = f.cached.remove(&f.cancel, &h).await.unwrap_err();
        assert!(f.cached.is_not_exist(&err));
        assert!(f.store.has(&h).await);
    }

    #[tokio::test]
    async fn test_cancelled_save_touches_nothing() {
        let f = fixture().await;
        let h = Handle::new(FileType::Snapshot, "snap");
        f.cancel.cancel();

        let err = f
            .cached
            .save(&f.cancel, &h, reader_from_bytes(b"snapshot".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Cancelled));
        assert!(!f.store.has(&h).await);
        assert!(f.backend.object(&h).is_none());
        assert_eq!(f.backend.save_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_load_caches_nothing() {
        let f = fixture().await;
        let h = Handle::new(FileType::Index, "idx");
        f.backend.insert_object(h.clone(), b"index".to_vec());
        f.cancel.cancel();

        let err = f.cached.load(&f.cancel, &h, 0, 0).await.err().unwrap();
        assert!(matches!(err, BackendError::Cancelled));
        assert!(!f.store.has(&h).await);
    }

    #[tokio::test]
    async fn test_unstorable_names_pass_through() {
        let f = fixture().await;
        let hidden = Handle::new(FileType::Snapshot, ".hidden");
        f.backend.insert_object(hidden.clone(), b"hidden snapshot".to_vec());

        let rd = f.cached.load(&f.cancel, &hidden, 0, 0).await.unwrap();
        assert_eq!(read_all(rd).await, b"hidden snapshot");
        assert!(!f.store.has(&hidden).await);

        let nested = Handle::new(FileType::Index, "a/b");
        f.cached
            .save(&f.cancel, &nested, reader_from_bytes(b"index".to_vec()))
            .await
            .unwrap();
        assert_eq!(f.backend.object(&nested).unwrap(), b"index");
        assert!(f.store.list(FileType::Index).await.unwrap().is_empty());

        f.cached.remove(&f.cancel, &nested).await.unwrap();
        assert!(f.backend.object(&nested).is_none());
    }

    #[tokio::test]
    async fn test_config_handle_passes_through() {
        let temp_dir = TempDir::new().unwrap();
        let layout = CacheLayout::default()
            .with_subdir(FileType::Config, "config")
            .with_cacheable(FileType::Config);
        let store = Arc::new(
            CacheStore::open("repo", Some(temp_dir.path()), layout)
                .await
                .unwrap(),
        );
        let backend = Arc::new(MemoryBackend::new());
        let cached = CachedBackend::new(backend.clone(), store.clone());
        let cancel = CancellationToken::new();
        let h = Handle::config();

        cached
            .save(&cancel, &h, reader_from_bytes(b"{}".to_vec()))
            .await
            .unwrap();
        let rd = cached.load(&cancel, &h, 0, 0).await.unwrap();
        assert_eq!(read_all(rd).await, b"{}");
        assert!(!store.has(&h).await);
        assert_eq!(backend.load_count(), 1);
    }

    /// Reader that fires a cancellation token once its inner reader is drained.
    struct CancelAtEof {
        inner: ObjectReader,
        cancel: CancellationToken,
    }

    impl tokio::io::AsyncRead for CancelAtEof {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            let before = buf.filled().len();
            let poll = std::pin::Pin::new(&mut self.inner).poll_read(cx, buf);
            if let std::task::Poll::Ready(Ok(())) = &poll {
                if buf.filled().len() == before {
                    self.cancel.cancel();
                }
            }
            poll
        }
    }

    /// A memory backend whose loads cancel the token while being read.
    struct InterruptedBackend {
        inner: MemoryBackend,
        cancel: CancellationToken,
    }

    impl Backend for InterruptedBackend {
        fn location(&self) -> String {
            self.inner.location()
        }

        async fn save(
            &self,
            cancel: &CancellationToken,
            h: &Handle,
            rd: ObjectReader,
        ) -> Result<()> {
            self.inner.save(cancel, h, rd).await
        }

        async fn load(
            &self,
            cancel: &CancellationToken,
            h: &Handle,
            length: u64,
            offset: u64,
        ) -> Result<ObjectReader> {
            let inner = self.inner.load(cancel, h, length, offset).await?;
            Ok(Box::new(CancelAtEof {
                inner,
                cancel: self.cancel.clone(),
            }))
        }

        async fn stat(&self, cancel: &CancellationToken, h: &Handle) -> Result<FileInfo> {
            self.inner.stat(cancel, h).await
        }

        async fn remove(&self, cancel: &CancellationToken, h: &Handle) -> Result<()> {
            self.inner.remove(cancel, h).await
        }

        async fn list(
            &self,
            cancel: &CancellationToken,
            file_type: FileType,
        ) -> Result<Vec<String>> {
            self.inner.list(cancel, file_type).await
        }

        fn is_not_exist(&self, err: &BackendError) -> bool {
            self.inner.is_not_exist(err)
        }

        async fn close(&self) -> Result<()> {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn test_cancel_while_populating_cache_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(
            CacheStore::open("repo", Some(temp_dir.path()), CacheLayout::default())
                .await
                .unwrap(),
        );
        let cancel = CancellationToken::new();
        let backend = InterruptedBackend {
            inner: MemoryBackend::new(),
            cancel: cancel.clone(),
        };
        let h = Handle::new(FileType::Index, "idx");
        backend.inner.insert_object(h.clone(), b"index".to_vec());
        let cached = CachedBackend::new(Arc::new(backend), store.clone());

        let err = cached.load(&cancel, &h, 0, 0).await.err().unwrap();
        assert!(matches!(err, BackendError::Cancelled));
        assert!(cancel.is_cancelled());
        assert!(!store.has(&h).await);
    }

    /// A cache that accepts nothing and fails every removal with an I/O error.
    struct BrokenRemoveCache;

    #[async_trait::async_trait]
    impl ObjectCache for BrokenRemoveCache {
        fn is_cacheable(&self, _h: &Handle) -> bool {
            false
        }

        async fn has(&self, _h: &Handle) -> bool {
            false
        }

        async fn load(&self, h: &Handle, _: u64, _: u64) -> crate::caches::Result<ObjectReader> {
            Err(CacheError::NotCached { handle: h.clone() })
        }

        async fn save(&self, h: &Handle, _: ObjectReader) -> crate::caches::Result<()> {
            Err(CacheError::NotCacheable { handle: h.clone() })
        }

        async fn remove(&self, _h: &Handle) -> crate::caches::Result<()> {
            Err(CacheError::Io {
                op: "remove",
                path: std::path::PathBuf::from("/cache/snapshots/snap"),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }
    }

    #[tokio::test]
    async fn test_remove_propagates_cache_errors() {
        let backend = Arc::new(MemoryBackend::new());
        let cached = CachedBackend::new(backend.clone(), Arc::new(BrokenRemoveCache));
        let cancel = CancellationToken::new();
        let h = Handle::new(FileType::Snapshot, "snap");
        backend.insert_object(h.clone(), b"snapshot".to_vec());

        let err = cached.remove(&cancel, &h).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Cache(CacheError::Io { op: "remove", .. })
        ));
        assert!(backend.object(&h).is_none());
    }

    struct RejectingBackend;

    impl Backend for RejectingBackend {
        fn location(&self) -> String {
            "rejecting".to_string()
        }

        async fn save(&self, _: &CancellationToken, _: &Handle, _: ObjectReader) -> Result<()> {
            Err(BackendError::Other("read-only backend".to_string()))
        }

        async fn load(
            &self,
            _: &CancellationToken,
            h: &Handle,
            _: u64,
            _: u64,
        ) -> Result<ObjectReader> {
            Err(BackendError::NotFound(h.clone()))
        }

        async fn stat(&self, _: &CancellationToken, h: &Handle) -> Result<FileInfo> {
            Err(BackendError::NotFound(h.clone()))
        }

        async fn remove(&self, _: &CancellationToken, h: &Handle) -> Result<()> {
            Err(BackendError::NotFound(h.clone()))
        }

        async fn list(&self, _: &CancellationToken, _: FileType) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn is_not_exist(&self, err: &BackendError) -> bool {
            matches!(err, BackendError::NotFound(_))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_backend_save_drops_cached_copy() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(
            CacheStore::open("repo", Some(temp_dir.path()), CacheLayout::default())
                .await
                .unwrap(),
        );
        let cached = CachedBackend::new(Arc::new(RejectingBackend), store.clone());
        let cancel = CancellationToken::new();
        let h = Handle::new(FileType::Snapshot, "snap");

        let err = cached
            .save(&cancel, &h, reader_from_bytes(b"snapshot".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Other(_)));
        assert!(!store.has(&h).await);
    }

    #[tokio::test]
    async fn test_noop_cache_passes_through() {
        let backend = Arc::new(MemoryBackend::new());
        let cached = CachedBackend::new(backend.clone(), Arc::new(NoopCache));
        let cancel = CancellationToken::new();
        let h = Handle::new(FileType::Snapshot, "snap");

        cached
            .save(&cancel, &h, reader_from_bytes(b"snapshot".to_vec()))
            .await
            .unwrap();
        let rd = cached.load(&cancel, &h, 0, 0).await.unwrap();
        assert_eq!(read_all(rd).await, b"snapshot");
        cached.remove(&cancel, &h).await.unwrap();
        assert!(backend.object(&h).is_none());
        assert_eq!(cached.location(), "memory");
    }
}
