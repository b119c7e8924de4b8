//! Key-value persistence for the tracked city list.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt storage file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persistent key-value storage, one JSON value per key.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` when absent.
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// File-backed store: a single JSON object mapping keys to values.
///
/// Every `set` rewrites the whole file; writes are small and infrequent
/// enough that this stays simple.
pub struct JsonFileStore {
    path: PathBuf,
    // serializes read-modify-write cycles against the backing file
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&map)?)?;
        Ok(())
    }
}
