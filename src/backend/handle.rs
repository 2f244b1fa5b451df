//! Object addressing: file types, handles and content identifiers.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors produced when parsing a [`FileType`] or an [`Id`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown file type '{0}'")]
    UnknownFileType(String),

    #[error("invalid id '{value}': {message}")]
    InvalidId { value: String, message: String },
}

/// The kind of object stored in a repository backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileType {
    /// Bulk payload packs.
    Data,
    /// Encrypted master key files.
    Key,
    /// Repository locks.
    Lock,
    /// Snapshot records.
    Snapshot,
    /// Index blocks.
    Index,
    /// The repository configuration document.
    Config,
}

impl FileType {
    /// Every file type, in a stable order.
    pub const ALL: [FileType; 6] = [
        FileType::Data,
        FileType::Key,
        FileType::Lock,
        FileType::Snapshot,
        FileType::Index,
        FileType::Config,
    ];

    /// The canonical lowercase name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Data => "data",
            FileType::Key => "key",
            FileType::Lock => "lock",
            FileType::Snapshot => "snapshot",
            FileType::Index => "index",
            FileType::Config => "config",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        // Plural spellings are accepted since they match the directory names.
        match lower.as_str() {
            "data" => Ok(FileType::Data),
            "key" | "keys" => Ok(FileType::Key),
            "lock" | "locks" => Ok(FileType::Lock),
            "snapshot" | "snapshots" => Ok(FileType::Snapshot),
            "index" => Ok(FileType::Index),
            "config" => Ok(FileType::Config),
            _ => Err(ParseError::UnknownFileType(s.to_string())),
        }
    }
}

/// Identifies a single object in a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    pub file_type: FileType,
    pub name: String,
}

impl Handle {
    pub fn new(file_type: FileType, name: impl Into<String>) -> Self {
        Self {
            file_type,
            name: name.into(),
        }
    }

    /// The handle of the repository configuration document, which has no name.
    pub fn config() -> Self {
        Self::new(FileType::Config, "")
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "<{}>", self.file_type)
        } else {
            write!(f, "<{}/{}>", self.file_type, self.name)
        }
    }
}

/// Length of an [`Id`] in bytes.
pub const ID_LEN: usize = 32;

/// A SHA-256 sized identifier, written as 64 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; ID_LEN]);

impl Id {
    pub fn new(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Compute the id of `data` (its SHA-256 hash).
    pub fn hash(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut bytes = [0u8; ID_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Parse an id from its hex form.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let invalid = |message: String| ParseError::InvalidId {
            value: s.to_string(),
            message,
        };

        if s.len() != ID_LEN * 2 {
            return Err(invalid(format!(
                "expected {} hex characters, got {}",
                ID_LEN * 2,
                s.len()
            )));
        }

        let mut bytes = [0u8; ID_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| invalid(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// A short prefix suitable for log output.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Id {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Id::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_parse() {
        for t in FileType::ALL {
            assert_eq!(t.as_str().parse::<FileType>().unwrap(), t);
        }
        assert_eq!("Snapshots".parse::<FileType>().unwrap(), FileType::Snapshot);
        assert_eq!("keys".parse::<FileType>().unwrap(), FileType::Key);
        assert!(matches!(
            "packs".parse::<FileType>(),
            Err(ParseError::UnknownFileType(_))
        ));
    }

    #[test]
    fn test_handle_display() {
        let h = Handle::new(FileType::Index, "abc123");
        assert_eq!(h.to_string(), "<index/abc123>");
        assert_eq!(Handle::config().to_string(), "<config>");
    }

    #[test]
    fn test_id_hash_is_sha256() {
        let id = Id::hash(b"");
        assert_eq!(
            id.to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(id.short(), "e3b0c442");
    }

    #[test]
    fn test_id_parse_roundtrip() {
        let id = Id::hash(b"some key material");
        let parsed: Id = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_id_parse_rejects_bad_input() {
        assert!(Id::parse("abc").is_err());
        assert!(Id::parse(&"zz".repeat(32)).is_err());
        assert!(Id::parse(&"a".repeat(65)).is_err());
    }
}
