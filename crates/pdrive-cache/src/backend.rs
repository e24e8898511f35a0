//! Durable storage under a cache context.
//!
//! Three backends are available:
//!   - **JSON** (default): whole tables in one file, written atomically via temp+rename.
//!   - **Memory**: process-local, for tests and ephemeral sessions.
//!   - **RocksDB** (behind the `rocksdb` feature): one key per table, written in a single batch.

use pdrive_core::config::{expand_home, CacheBackendKind, CacheConfig};
use pdrive_core::{DriveError, DriveResult};
use std::path::{Path, PathBuf};

use crate::store::CacheTables;

/// Storage for committed cache tables.
pub trait CacheBackend: Send {
    /// Read the last committed tables; an empty store yields empty tables.
    fn load(&self) -> DriveResult<CacheTables>;
    /// Replace the stored tables. Must be all-or-nothing.
    fn persist(&mut self, tables: &CacheTables) -> DriveResult<()>;
    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

// ── JSON file backend ────────────────────────────────────────────────────────

pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheBackend for JsonFileBackend {
    fn load(&self) -> DriveResult<CacheTables> {
        if !self.path.exists() {
            return Ok(CacheTables::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| DriveError::Storage(format!("reading cache {}: {e}", self.path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| DriveError::Storage(format!("parsing cache {}: {e}", self.path.display())))
    }

    fn persist(&mut self, tables: &CacheTables) -> DriveResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DriveError::Storage(format!("creating cache dir {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_string_pretty(tables)
            .map_err(|e| DriveError::Storage(format!("serializing cache: {e}")))?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| {
            DriveError::Storage(format!("writing cache temp {}: {e}", tmp_path.display()))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            DriveError::Storage(format!("renaming cache {}: {e}", self.path.display()))
        })?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

// ── In-memory backend ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryBackend {
    tables: CacheTables,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from already committed tables.
    pub fn with_tables(tables: CacheTables) -> Self {
        Self { tables }
    }
}

impl CacheBackend for MemoryBackend {
    fn load(&self) -> DriveResult<CacheTables> {
        Ok(self.tables.clone())
    }

    fn persist(&mut self, tables: &CacheTables) -> DriveResult<()> {
        self.tables = tables.clone();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

// ── RocksDB backend ──────────────────────────────────────────────────────────

#[cfg(feature = "rocksdb")]
mod rocksdb_backend {
    use super::*;

    /// RocksDB-backed cache: each table is stored as a JSON value under its
    /// table name, and a save writes every table in one `WriteBatch`.
    pub struct RocksDbBackend {
        db: rocksdb::DB,
        path: PathBuf,
    }

    impl RocksDbBackend {
        pub fn open(path: &Path) -> DriveResult<Self> {
            let mut opts = rocksdb::Options::default();
            opts.create_if_missing(true);

            let db = rocksdb::DB::open(&opts, path)
                .map_err(|e| DriveError::Storage(format!("opening RocksDB {}: {e}", path.display())))?;
            Ok(Self {
                db,
                path: path.to_path_buf(),
            })
        }
    }

    impl CacheBackend for RocksDbBackend {
        fn load(&self) -> DriveResult<CacheTables> {
            let mut object = serde_json::Map::new();
            for item in self.db.iterator(rocksdb::IteratorMode::Start) {
                let (key, value) = item
                    .map_err(|e| DriveError::Storage(format!("iterating RocksDB entries: {e}")))?;
                let table = String::from_utf8_lossy(&key).to_string();
                let value: serde_json::Value = serde_json::from_slice(&value)
                    .map_err(|e| DriveError::Storage(format!("parsing table {table}: {e}")))?;
                object.insert(table, value);
            }
            serde_json::from_value(serde_json::Value::Object(object))
                .map_err(|e| DriveError::Storage(format!("decoding cache tables: {e}")))
        }

        fn persist(&mut self, tables: &CacheTables) -> DriveResult<()> {
            let value = serde_json::to_value(tables)
                .map_err(|e| DriveError::Storage(format!("serializing cache: {e}")))?;
            let serde_json::Value::Object(object) = value else {
                return Err(DriveError::Storage("cache tables must serialize to an object".into()));
            };

            let mut batch = rocksdb::WriteBatch::default();
            for (table, records) in object {
                let bytes = serde_json::to_vec(&records)
                    .map_err(|e| DriveError::Storage(format!("serializing table {table}: {e}")))?;
                batch.put(table.as_bytes(), bytes);
            }
            self.db
                .write(batch)
                .map_err(|e| DriveError::Storage(format!("writing RocksDB batch: {e}")))
        }

        fn describe(&self) -> String {
            format!("rocksdb:{}", self.path.display())
        }
    }
}

#[cfg(feature = "rocksdb")]
pub use rocksdb_backend::RocksDbBackend;

/// Open the backend selected in the `[cache]` config section.
pub fn open_backend(config: &CacheConfig) -> DriveResult<Box<dyn CacheBackend>> {
    let path = expand_home(&config.path);
    match config.backend {
        CacheBackendKind::Json => Ok(Box::new(JsonFileBackend::new(&path))),
        CacheBackendKind::Memory => Ok(Box::new(MemoryBackend::new())),
        #[cfg(feature = "rocksdb")]
        CacheBackendKind::Rocksdb => Ok(Box::new(RocksDbBackend::open(&path)?)),
        #[cfg(not(feature = "rocksdb"))]
        CacheBackendKind::Rocksdb => {
            tracing::warn!(
                "RocksDB not compiled in (missing 'rocksdb' feature), falling back to JSON backend"
            );
            Ok(Box::new(JsonFileBackend::new(&path.with_extension("json"))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ShareRecord, VolumeRecord};
    use pdrive_core::types::{ShareKind, VolumeType};

    fn sample_tables() -> CacheTables {
        let mut tables = CacheTables::default();
        tables.volumes.insert(
            "vol-1".into(),
            VolumeRecord {
                id: "vol-1".into(),
                kind: VolumeType::Photo,
                max_space: 10,
                used_space: 1,
            },
        );
        tables.shares.insert(
            "share-1".into(),
            ShareRecord {
                id: "share-1".into(),
                kind: ShareKind::Photos,
                volume_id: Some("vol-1".into()),
                root_link_id: Some("root".into()),
                creator: None,
                address_id: None,
                locked: false,
            },
        );
        tables
    }

    #[test]
    fn json_backend_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(&tmp.path().join("cache.json"));
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn json_backend_persists_atomically() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("cache.json");
        let mut backend = JsonFileBackend::new(&path);
        backend.persist(&sample_tables()).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
        let reopened = JsonFileBackend::new(&path);
        assert_eq!(reopened.load().unwrap(), sample_tables());
    }

    #[test]
    fn json_backend_rejects_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonFileBackend::new(&path).load().unwrap_err();
        assert!(matches!(err, DriveError::Storage(_)));
    }

    #[test]
    fn memory_backend_keeps_last_persisted() {
        let mut backend = MemoryBackend::new();
        backend.persist(&sample_tables()).unwrap();
        assert_eq!(backend.load().unwrap(), sample_tables());
    }

    #[test]
    fn open_backend_follows_config() {
        let tmp = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            path: tmp.path().join("cache.json"),
            backend: CacheBackendKind::Json,
        };
        let backend = open_backend(&config).unwrap();
        assert!(backend.describe().starts_with("json:"));

        let config = CacheConfig {
            backend: CacheBackendKind::Memory,
            ..config
        };
        assert_eq!(open_backend(&config).unwrap().describe(), "memory");
    }

    #[cfg(feature = "rocksdb")]
    #[test]
    fn rocksdb_backend_roundtrips_tables() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cache.db");
        {
            let mut backend = RocksDbBackend::open(&path).unwrap();
            backend.persist(&sample_tables()).unwrap();
        }
        let backend = RocksDbBackend::open(&path).unwrap();
        assert_eq!(backend.load().unwrap(), sample_tables());
    }
}
