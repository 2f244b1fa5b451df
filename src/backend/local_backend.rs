use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::handle::{FileType, Handle};
use super::repo_backend::{Backend, BackendError, FileInfo, ObjectReader, Result, cancellable};

/// Counter for generating unique temp file names.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Directory holding in-flight writes.
const TEMP_DIR: &str = "tmp";

/// A repository backend stored in a local directory.
///
/// Layout:
/// - `{base}/config`
/// - `{base}/data/{name[0..2]}/{name}`
/// - `{base}/{keys,locks,snapshots,index}/{name}`
///
/// Writes are atomic: data is written to a temp file in `tmp/`, made
/// read-only, then renamed into place.
pub struct LocalBackend {
    base_path: PathBuf,
}

impl LocalBackend {
    /// Open an existing repository directory.
    pub async fn open(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        let meta = fs::metadata(&base_path).await.map_err(|e| {
            BackendError::Other(format!(
                "unable to open repository at {}: {}",
                base_path.display(),
                e
            ))
        })?;
        if !meta.is_dir() {
            return Err(BackendError::Other(format!(
                "{} is not a directory",
                base_path.display()
            )));
        }
        Ok(Self { base_path })
    }

    /// Create the directory structure for a new repository.
    pub async fn create(base_path: impl AsRef<Path>) -> Result<Self> {
        let backend = Self {
            base_path: base_path.as_ref().to_path_buf(),
        };

        let mut dirs = vec![backend.temp_dir()];
        dirs.extend(
            FileType::ALL
                .iter()
                .filter_map(|t| Self::type_dir(*t))
                .map(|d| backend.base_path.join(d)),
        );
        for dir in dirs {
            create_private_dir(&dir).await?;
        }

        debug!(path = %backend.base_path.display(), "created local repository");
        Ok(backend)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// The directory holding objects of the given type.
    fn type_dir(file_type: FileType) -> Option<&'static str> {
        match file_type {
            FileType::Data => Some("data"),
            FileType::Key => Some("keys"),
            FileType::Lock => Some("locks"),
            FileType::Snapshot => Some("snapshots"),
            FileType::Index => Some("index"),
            FileType::Config => None,
        }
    }

    /// Resolve a handle to its file path.
    fn object_path(&self, h: &Handle) -> Result<PathBuf> {
        let Some(dir) = Self::type_dir(h.file_type) else {
            return Ok(self.base_path.join("config"));
        };

        let name = h.name.as_str();
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(BackendError::Other(format!("invalid object name for {}", h)));
        }

        let mut path = self.base_path.join(dir);
        if h.file_type == FileType::Data {
            // Shards are named after the first two bytes of the name.
            let Some(shard) = name.get(..2) else {
                return Err(BackendError::Other(format!(
                    "data object name too short to shard: {}",
                    h
                )));
            };
            path.push(shard);
        }
        path.push(name);
        Ok(path)
    }

    fn temp_dir(&self) -> PathBuf {
        self.base_path.join(TEMP_DIR)
    }

    /// Generate a unique temp file path.
    fn temp_file_path(&self) -> PathBuf {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        self.temp_dir().join(format!("tmp.{}.{}", pid, counter))
    }

    async fn write_object(
        &self,
        rd: &mut ObjectReader,
        temp_path: &Path,
        path: &Path,
    ) -> Result<()> {
        fs::create_dir_all(self.temp_dir()).await?;

        let mut file = fs::File::create(temp_path).await?;
        tokio::io::copy(rd, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        set_read_only(temp_path).await?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(temp_path, path).await?;
        Ok(())
    }
}

fn map_not_found(h: &Handle) -> impl FnOnce(std::io::Error) -> BackendError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BackendError::NotFound(h.clone())
        } else {
            BackendError::Io(e)
        }
    }
}

/// List file names in `dir`, treating a missing directory as empty.
async fn read_names(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BackendError::Io(e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    Ok(names)
}

async fn create_private_dir(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(path).await?;
    Ok(())
}

#[cfg(unix)]
async fn set_read_only(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o400)).await
}

#[cfg(not(unix))]
async fn set_read_only(path: &Path) -> std::io::Result<()> {
    let mut perms = fs::metadata(path).await?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms).await
}

impl Backend for LocalBackend {
    fn location(&self) -> String {
        self.base_path.display().to_string()
    }

    async fn save(
        &self,
        cancel: &CancellationToken,
        h: &Handle,
        mut rd: ObjectReader,
    ) -> Result<()> {
        let path = self.object_path(h)?;
        let temp_path = self.temp_file_path();

        let result = cancellable(cancel, self.write_object(&mut rd, &temp_path, &path)).await;
        if result.is_err() {
            // The temp file may or may not exist at this point.
            let _ = fs::remove_file(&temp_path).await;
        }
        result
    }

    async fn load(
        &self,
        cancel: &CancellationToken,
        h: &Handle,
        length: u64,
        offset: u64,
    ) -> Result<ObjectReader> {
        let path = self.object_path(h)?;
        cancellable(cancel, async {
            let mut file = fs::File::open(&path).await.map_err(map_not_found(h))?;
            let size = file.metadata().await?.len();
            if offset > size {
                return Err(BackendError::Other(format!(
                    "offset {} exceeds size {} of {}",
                    offset, size, h
                )));
            }
            if offset > 0 {
                file.seek(SeekFrom::Start(offset)).await?;
            }

            let rd: ObjectReader = if length > 0 {
                Box::new(file.take(length))
            } else {
                Box::new(file)
            };
            Ok(rd)
        })
        .await
    }

    async fn stat(&self, cancel: &CancellationToken, h: &Handle) -> Result<FileInfo> {
        let path = self.object_path(h)?;
        cancellable(cancel, async {
            let meta = fs::metadata(&path).await.map_err(map_not_found(h))?;
            Ok(FileInfo {
                name: h.name.clone(),
                size: meta.len(),
            })
        })
        .await
    }

    async fn remove(&self, cancel: &CancellationToken, h: &Handle) -> Result<()> {
        let path = self.object_path(h)?;
        cancellable(cancel, async {
            fs::remove_file(&path).await.map_err(map_not_found(h))
        })
        .await
    }

    async fn list(&self, cancel: &CancellationToken, file_type: FileType) -> Result<Vec<String>> {
        let Some(dir) = Self::type_dir(file_type) else {
            return Ok(Vec::new());
        };
        let dir = self.base_path.join(dir);

        cancellable(cancel, async {
            let mut names = Vec::new();
            if file_type == FileType::Data {
                for sub in read_names(&dir).await? {
                    names.extend(read_names(&dir.join(sub)).await?);
                }
            } else {
                names = read_names(&dir).await?;
            }
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
