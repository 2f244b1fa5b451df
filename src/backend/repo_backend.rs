use std::future::Future;

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use super::handle::{FileType, Handle};
use crate::caches::CacheError;

/// A readable stream of object contents.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Wrap an in-memory buffer as an [`ObjectReader`].
pub fn reader_from_bytes(data: Vec<u8>) -> ObjectReader {
    Box::new(std::io::Cursor::new(data))
}

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
}

/// Error type for backend operations.
#[derive(Debug)]
pub enum BackendError {
    /// The object was not found.
    NotFound(Handle),
    /// The operation was cancelled through its cancellation token.
    Cancelled,
    /// An I/O error occurred.
    Io(std::io::Error),
    /// The local cache in front of the backend failed.
    Cache(CacheError),
    /// A custom error message.
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotFound(h) => write!(f, "{} not found", h),
            BackendError::Cancelled => write!(f, "operation cancelled"),
            BackendError::Io(e) => write!(f, "I/O error: {}", e),
            BackendError::Cache(e) => write!(f, "cache error: {}", e),
            BackendError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Io(e) => Some(e),
            BackendError::Cache(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Io(e)
    }
}

impl From<CacheError> for BackendError {
    fn from(e: CacheError) -> Self {
        BackendError::Cache(e)
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// The object store interface that the cache decorates.
///
/// Every operation that performs I/O takes a [`CancellationToken`]. A call
/// whose token is cancelled should stop promptly and fail with
/// [`BackendError::Cancelled`].
pub trait Backend: Send + Sync {
    /// A human readable description of where the objects live.
    fn location(&self) -> String;

    /// Store the contents of `rd` under `h`, replacing any previous object.
    fn save(
        &self,
        cancel: &CancellationToken,
        h: &Handle,
        rd: ObjectReader,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Open the object `h` for reading.
    ///
    /// `length == 0` reads to the end of the object; `offset` skips that many
    /// bytes first.
    fn load(
        &self,
        cancel: &CancellationToken,
        h: &Handle,
        length: u64,
        offset: u64,
    ) -> impl Future<Output = Result<ObjectReader>> + Send;

    /// Return metadata for `h`.
    fn stat(
        &self,
        cancel: &CancellationToken,
        h: &Handle,
    ) -> impl Future<Output = Result<FileInfo>> + Send;

    /// Delete the object `h`.
    fn remove(
        &self,
        cancel: &CancellationToken,
        h: &Handle,
    ) -> impl Future<Output = Result<()>> + Send;

    /// List the names of all objects of the given type, sorted.
    fn list(
        &self,
        cancel: &CancellationToken,
        file_type: FileType,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Whether `err` means the requested object does not exist.
    fn is_not_exist(&self, err: &BackendError) -> bool;

    /// Release any resources held by the backend.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Run `fut` unless `cancel` fires first.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(BackendError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BackendError::Cancelled),
        result = fut => result,
    }
}
