//! Repository backends: the object store interface and its implementations.

mod handle;
mod local_backend;
mod memory_backend;
mod repo_backend;

pub use handle::{FileType, Handle, ID_LEN, Id, ParseError};
pub use local_backend::LocalBackend;
pub use memory_backend::MemoryBackend;
pub use repo_backend::{
    Backend, BackendError, FileInfo, ObjectReader, Result, cancellable, reader_from_bytes,
};
