//! Durable key-value storage
//!
//! The retry queue persists through a minimal get/set/remove contract
//! addressed by one fixed key. Local, synchronous, and small; callers
//! treat failures as degradation, never as session failure.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::TelemetryError;

/// Blob storage contract for the retry queue.
pub trait QueueStorage {
    /// Stored value for `key`, or `None` when absent.
    fn get(&self, key: &str) -> Result<Option<String>, TelemetryError>;
    /// Store `value` under `key`, overwriting any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), TelemetryError>;
    /// Remove `key` if present.
    fn remove(&self, key: &str) -> Result<(), TelemetryError>;
}

impl<'a, S: QueueStorage + ?Sized> QueueStorage for &'a S {
    fn get(&self, key: &str) -> Result<Option<String>, TelemetryError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TelemetryError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), TelemetryError> {
        (**self).remove(key)
    }
}

/// File-backed storage: one file per key inside a base directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl QueueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, TelemetryError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| TelemetryError::StorageError(format!("read {}: {}", path.display(), e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TelemetryError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| TelemetryError::StorageError(format!("mkdir {}: {}", self.dir.display(), e)))?;
        let path = self.path_for(key);
        fs::write(&path, value)
            .map_err(|e| TelemetryError::StorageError(format!("write {}: {}", path.display(), e)))
    }

    fn remove(&self, key: &str) -> Result<(), TelemetryError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path)
            .map_err(|e| TelemetryError::StorageError(format!("remove {}: {}", path.display(), e)))
    }
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a value, e.g. to simulate a previous process run.
    #[cfg(test)]
    pub fn seed(&self, key: &str, value: &str) {
        self.set(key, value).expect("seed in-memory storage");
    }

    fn values(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, TelemetryError> {
        self.values
            .lock()
            .map_err(|_| TelemetryError::StorageError("storage mutex poisoned".to_string()))
    }
}

impl QueueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, TelemetryError> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), TelemetryError> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), TelemetryError> {
        self.values()?.remove(key);
        Ok(())
    }
}
