use serde::{Deserialize, Serialize};

/// The repository format version written by `init`.
pub const REPO_VERSION: u32 = 1;

/// Repository identity, stored as JSON under the `config` handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Unique repository id. Scopes the repository's cache directory.
    pub id: String,
    pub version: u32,
}

impl RepositoryInfo {
    /// A new identity with a random id.
    pub fn generate() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            version: REPO_VERSION,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        let a = RepositoryInfo::generate();
        let b = RepositoryInfo::generate();
        assert_ne!(a.id, b.id);
        assert_eq!(a.version, REPO_VERSION);
    }

    #[test]
    fn test_json_format() {
        let info = RepositoryInfo {
            id: "5f0c3e1a-7d2b-4e8f-9a61-0b2c3d4e5f60".to_string(),
            version: 1,
        };
        let json: serde_json::Value = serde_json::from_slice(&info.to_json().unwrap()).unwrap();
        assert_eq!(json["id"], "5f0c3e1a-7d2b-4e8f-9a61-0b2c3d4e5f60");
        assert_eq!(json["version"], 1);

        assert_eq!(RepositoryInfo::from_json(&info.to_json().unwrap()).unwrap(), info);
        assert!(RepositoryInfo::from_json(b"{\"id\": 3}").is_err());
    }
}
