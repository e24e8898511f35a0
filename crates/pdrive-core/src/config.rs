use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{DriveError, DriveResult};

/// Top-level configuration (loaded from pdrive.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub session: SessionConfig,
    pub moves: MoveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Json,
    Memory,
    Rocksdb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Location of the local metadata cache
    pub path: PathBuf,
    pub backend: CacheBackendKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserHashStoreKind {
    #[default]
    Keychain,
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Where the last logged-in user fingerprint is kept
    pub user_hash_store: UserHashStoreKind,
    /// Fingerprint file, used when `user_hash_store = "file"`
    pub user_hash_file: PathBuf,
    /// Keychain service name, used when `user_hash_store = "keychain"`
    pub keychain_service: String,
}

/// What to do with moved nodes the server did not confirm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnconfirmedNodePolicy {
    /// Leave the node as last known
    #[default]
    Skip,
    /// Repoint the parent only, keep the old name and keys
    Reparent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveConfig {
    pub unconfirmed_nodes: UnconfirmedNodePolicy,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/pdrive/cache.json"),
            backend: CacheBackendKind::Json,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_hash_store: UserHashStoreKind::Keychain,
            user_hash_file: PathBuf::from("~/.local/share/pdrive/user-hash"),
            keychain_service: "pdrive".into(),
        }
    }
}

impl DriveConfig {
    /// Load configuration from a TOML file; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> DriveResult<Self> {
        if !path.exists() {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| DriveError::Config(format!("reading config {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| DriveError::Config(format!("parsing config {}: {e}", path.display())))
    }
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
