//! Key/value persistence backends.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::infra::{read_json_file, write_json_file};

/// Errors from a key/value backend.
#[derive(Debug, Error)]
pub enum KvError {
    /// An I/O error occurred.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The write would exceed the area's byte quota.
    #[error("quota exceeded: {size} bytes > {limit} byte limit")]
    QuotaExceeded { size: usize, limit: usize },
}

/// Result type for backend operations.
pub type KvResult<T> = Result<T, KvError>;

/// A durable key/value backend holding JSON values.
pub trait KvBackend: Send + Sync {
    fn get(&self, key: &str) -> KvResult<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> KvResult<()>;
    fn remove(&self, key: &str) -> KvResult<()>;
    fn clear(&self) -> KvResult<()>;
    fn keys(&self) -> KvResult<Vec<String>>;
}

type RawMap = BTreeMap<String, Value>;

/// File-backed backend: one JSON object per area, replaced atomically on
/// every write. An optional quota bounds the serialized size of the whole
/// area, mirroring the host's quota-limited settings storage.
pub struct FileBackend {
    path: PathBuf,
    quota_bytes: Option<usize>,
    // Serializes read-modify-write cycles within the process.
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: PathBuf, quota_bytes: Option<usize>) -> Self {
        Self {
            path,
            quota_bytes,
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> KvResult<RawMap> {
        read_json_file(&self.path).map_err(|e| KvError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    fn store(&self, map: &RawMap) -> KvResult<()> {
        if let Some(limit) = self.quota_bytes {
            let size = serde_json::to_string(map).map(|s| s.len()).unwrap_or(0);
            if size > limit {
                return Err(KvError::QuotaExceeded { size, limit });
            }
        }
        write_json_file(&self.path, map).map_err(|e| KvError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> KvResult<Option<Value>> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> KvResult<()> {
        let _guard = self.lock.lock();
        let mut map = self.load()?;
        map.insert(key.to_string(), value);
        self.store(&map)
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        let _guard = self.lock.lock();
        let mut map = self.load()?;
        if map.remove(key).is_some() {
            self.store(&map)?;
        }
        Ok(())
    }

    fn clear(&self) -> KvResult<()> {
        let _guard = self.lock.lock();
        self.store(&RawMap::new())
    }

    fn keys(&self) -> KvResult<Vec<String>> {
        let _guard = self.lock.lock();
        Ok(self.load()?.keys().cloned().collect())
    }
}

/// In-process backend used as the transparent fallback when a durable
/// backend is unavailable, and as both areas in tests.
#[derive(Default)]
pub struct MemoryBackend {
    map: Mutex<RawMap>,
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> KvResult<Option<Value>> {
        Ok(self.map.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> KvResult<()> {
        self.map.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        self.map.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> KvResult<()> {
        self.map.lock().clear();
        Ok(())
    }

    fn keys(&self) -> KvResult<Vec<String>> {
        Ok(self.map.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn file_backend_round_trips_values() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("local.json"), None);

        backend.set("theme", json!("dark")).unwrap();
        assert_eq!(backend.get("theme").unwrap(), Some(json!("dark")));
        assert_eq!(backend.keys().unwrap(), vec!["theme".to_string()]);

        backend.remove("theme").unwrap();
        assert_eq!(backend.get("theme").unwrap(), None);
    }

    #[test]
    fn file_backend_enforces_quota() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("sync.json"), Some(64));

        let big = "x".repeat(256);
        let err = backend.set("big", json!(big)).unwrap_err();
        assert!(matches!(err, KvError::QuotaExceeded { .. }));

        // Nothing was persisted.
        assert_eq!(backend.get("big").unwrap(), None);
    }

    #[test]
    fn clear_empties_the_area() {
        let backend = MemoryBackend::default();
        backend.set("a", json!(1)).unwrap();
        backend.set("b", json!(2)).unwrap();
        backend.clear().unwrap();
        assert!(backend.keys().unwrap().is_empty());
    }
}
