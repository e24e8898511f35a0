use pdrive_core::{DriveError, DriveResult};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Persisted fingerprint of the account that last used this device.
pub trait StoredUserHashRepository: Send + Sync {
    fn store(&self, hash: &str) -> DriveResult<()>;
    fn load_hash(&self) -> DriveResult<String>;
}

/// Fingerprint kept in a plain file, replaced atomically on store.
pub struct FileUserHashRepository {
    path: PathBuf,
}

impl FileUserHashRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoredUserHashRepository for FileUserHashRepository {
    fn store(&self, hash: &str) -> DriveResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, hash)?;
        std::fs::rename(&tmp_path, &self.path)?;
        tracing::debug!(path = %self.path.display(), "stored user fingerprint");
        Ok(())
    }

    fn load_hash(&self) -> DriveResult<String> {
        let content = std::fs::read_to_string(&self.path)?;
        let hash = content.trim();
        if hash.is_empty() {
            return Err(DriveError::Secrets(format!(
                "empty user fingerprint file: {}",
                self.path.display()
            )));
        }
        Ok(hash.to_string())
    }
}

/// In-process fingerprint store.
#[derive(Default)]
pub struct MemoryUserHashRepository {
    hash: RwLock<Option<String>>,
}

impl MemoryUserHashRepository {
    pub fn with_hash(hash: impl Into<String>) -> Self {
        Self {
            hash: RwLock::new(Some(hash.into())),
        }
    }
}

impl StoredUserHashRepository for MemoryUserHashRepository {
    fn store(&self, hash: &str) -> DriveResult<()> {
        let mut slot = self
            .hash
            .write()
            .map_err(|_| DriveError::Secrets("user fingerprint lock poisoned".into()))?;
        *slot = Some(hash.to_string());
        Ok(())
    }

    fn load_hash(&self) -> DriveResult<String> {
        self.hash
            .read()
            .map_err(|_| DriveError::Secrets("user fingerprint lock poisoned".into()))?
            .clone()
            .ok_or_else(|| DriveError::Secrets("missing stored user fingerprint".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileUserHashRepository::new(dir.path().join("nested/user-hash"));

        repo.store("H1").unwrap();
        assert_eq!(repo.load_hash().unwrap(), "H1");

        repo.store("H2").unwrap();
        assert_eq!(repo.load_hash().unwrap(), "H2");
        assert!(!repo.path().with_extension("tmp").exists());
    }

    #[test]
    fn file_store_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileUserHashRepository::new(dir.path().join("user-hash"));
        assert!(matches!(repo.load_hash(), Err(DriveError::Io(_))));
    }

    #[test]
    fn file_store_empty_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user-hash");
        std::fs::write(&path, "\n").unwrap();
        let repo = FileUserHashRepository::new(path);
        assert!(matches!(repo.load_hash(), Err(DriveError::Secrets(_))));
    }

    #[test]
    fn memory_store() {
        let repo = MemoryUserHashRepository::default();
        assert!(repo.load_hash().is_err());
        repo.store("H1").unwrap();
        assert_eq!(repo.load_hash().unwrap(), "H1");
    }
}
