//! Durable key/value store with two storage areas, TTL envelopes, an
//! in-memory read cache, and transparent fallback to an in-process backend
//! when a durable backend fails.
//!
//! Reads fail open (errors degrade to `None`); writes fail closed (callers
//! check the returned `bool`).

mod backend;

pub use backend::{FileBackend, KvBackend, KvError, KvResult, MemoryBackend};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::infra::now_ms;

/// Byte quota applied to the sync area, mirroring the host's quota-limited
/// settings storage.
const SYNC_QUOTA_BYTES: usize = 100 * 1024;

/// Which storage area a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageArea {
    /// Small, quota-limited settings area.
    Sync,
    /// Larger local area for bulk entries.
    #[default]
    Local,
}

impl StorageArea {
    fn prefix(self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
        }
    }
}

/// Per-call options for [`KeyValueStore`] operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct KvOptions {
    pub area: StorageArea,
    /// When set, stored values carry an expiry; reads past it return `None`
    /// and evict the entry.
    pub ttl_minutes: Option<i64>,
    /// Mirror reads in an in-process cache to avoid repeated backend
    /// round-trips within a session.
    pub cache_in_memory: bool,
}

impl KvOptions {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn sync() -> Self {
        Self {
            area: StorageArea::Sync,
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, minutes: i64) -> Self {
        self.ttl_minutes = Some(minutes);
        self
    }

    pub fn cached(mut self) -> Self {
        self.cache_in_memory = true;
        self
    }
}

/// Stored wrapper carrying the value and its optional expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    v: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

impl Envelope {
    fn expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Key/value store over two durable areas with an in-process fallback.
pub struct KeyValueStore {
    sync: Box<dyn KvBackend>,
    local: Box<dyn KvBackend>,
    fallback: MemoryBackend,
    mem_cache: Mutex<HashMap<String, Envelope>>,
}

impl KeyValueStore {
    /// Opens file-backed areas under `dir` (`sync.json` quota-limited,
    /// `local.json` unbounded).
    pub fn open(dir: &Path) -> Self {
        Self::with_backends(
            Box::new(FileBackend::new(
                dir.join("sync.json"),
                Some(SYNC_QUOTA_BYTES),
            )),
            Box::new(FileBackend::new(dir.join("local.json"), None)),
        )
    }

    /// Store with purely in-memory areas. Used in tests and non-persistent
    /// contexts.
    pub fn in_memory() -> Self {
        Self::with_backends(
            Box::new(MemoryBackend::default()),
            Box::new(MemoryBackend::default()),
        )
    }

    pub fn with_backends(sync: Box<dyn KvBackend>, local: Box<dyn KvBackend>) -> Self {
        Self {
            sync,
            local,
            fallback: MemoryBackend::default(),
            mem_cache: Mutex::new(HashMap::new()),
        }
    }

    fn backend(&self, area: StorageArea) -> &dyn KvBackend {
        match area {
            StorageArea::Sync => self.sync.as_ref(),
            StorageArea::Local => self.local.as_ref(),
        }
    }

    fn cache_key(area: StorageArea, key: &str) -> String {
        format!("{}:{}", area.prefix(), key)
    }

    /// Reads a value. Returns `None` on miss, expiry, or backend failure.
    pub fn get<T: DeserializeOwned>(&self, key: &str, opts: &KvOptions) -> Option<T> {
        let cache_key = Self::cache_key(opts.area, key);

        if opts.cache_in_memory {
            let cached = self.mem_cache.lock().get(&cache_key).cloned();
            if let Some(envelope) = cached {
                if envelope.expired(now_ms()) {
                    self.mem_cache.lock().remove(&cache_key);
                    self.evict(key, opts.area);
                    return None;
                }
                return serde_json::from_value(envelope.v).ok();
            }
        }

        let raw = match self.backend(opts.area).get(key) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, area = opts.area.prefix(), error = %e, "kv read failed, trying fallback");
                self.fallback.get(&cache_key).ok().flatten()
            }
        };
        // Values written during a degraded period live in the fallback.
        let raw = match raw {
            Some(v) => Some(v),
            None => self.fallback.get(&cache_key).ok().flatten(),
        };
        let raw = raw?;

        let envelope: Envelope = match serde_json::from_value(raw.clone()) {
            Ok(e) => e,
            // Legacy unwrapped value.
            Err(_) => Envelope {
                v: raw,
                expires_at: None,
            },
        };

        if envelope.expired(now_ms()) {
            self.evict(key, opts.area);
            return None;
        }

        if opts.cache_in_memory {
            self.mem_cache.lock().insert(cache_key, envelope.clone());
        }
        serde_json::from_value(envelope.v).ok()
    }

    /// Writes a value. Returns `false` when the write could not be persisted
    /// to either the durable backend or the fallback.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, opts: &KvOptions) -> bool {
        let v = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "kv value failed to serialize");
                return false;
            }
        };
        let envelope = Envelope {
            v,
            expires_at: opts.ttl_minutes.map(|m| now_ms() + m * 60_000),
        };
        let raw = match serde_json::to_value(&envelope) {
            Ok(raw) => raw,
            Err(_) => return false,
        };

        let cache_key = Self::cache_key(opts.area, key);
        let persisted = match self.backend(opts.area).set(key, raw.clone()) {
            Ok(()) => true,
            Err(KvError::QuotaExceeded { size, limit }) => {
                warn!(key, size, limit, "kv write rejected by quota");
                false
            }
            Err(e) => {
                warn!(key, area = opts.area.prefix(), error = %e, "kv write failed, using fallback");
                self.fallback.set(&cache_key, raw).is_ok()
            }
        };

        // The mirror tracks durable state only: populate it after a
        // successful write, and drop any stale entry on rejection.
        if opts.cache_in_memory {
            let mut cache = self.mem_cache.lock();
            if persisted {
                cache.insert(cache_key, envelope);
            } else {
                cache.remove(&cache_key);
            }
        }
        persisted
    }

    /// Merges a partial object into the existing value, or creates it.
    /// Non-object values are replaced wholesale.
    pub fn update<T: Serialize>(&self, key: &str, partial: &T, opts: &KvOptions) -> bool {
        let partial = match serde_json::to_value(partial) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let existing: Option<Value> = self.get(key, opts);

        let merged = match (existing, partial) {
            (Some(Value::Object(mut base)), Value::Object(overlay)) => {
                for (k, v) in overlay {
                    base.insert(k, v);
                }
                Value::Object(base)
            }
            (_, partial) => partial,
        };
        self.set(key, &merged, opts)
    }

    /// Removes a key. Returns `false` only when the removal failed
    /// everywhere.
    pub fn remove(&self, key: &str, opts: &KvOptions) -> bool {
        let cache_key = Self::cache_key(opts.area, key);
        self.mem_cache.lock().remove(&cache_key);
        let _ = self.fallback.remove(&cache_key);
        match self.backend(opts.area).remove(key) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "kv remove failed");
                false
            }
        }
    }

    /// Clears an entire area.
    pub fn clear(&self, opts: &KvOptions) -> bool {
        let prefix = format!("{}:", opts.area.prefix());
        self.mem_cache.lock().retain(|k, _| !k.starts_with(&prefix));
        if let Ok(keys) = self.fallback.keys() {
            for k in keys.iter().filter(|k| k.starts_with(&prefix)) {
                let _ = self.fallback.remove(k);
            }
        }
        match self.backend(opts.area).clear() {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "kv clear failed");
                false
            }
        }
    }

    /// Lists keys in an area. Degrades to empty on failure.
    pub fn list_keys(&self, opts: &KvOptions) -> Vec<String> {
        match self.backend(opts.area).keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "kv key listing failed");
                self.fallback.keys().unwrap_or_default()
            }
        }
    }

    /// Best-effort removal of an expired entry from the durable backend and
    /// from the fallback, where it may live after a degraded write.
    fn evict(&self, key: &str, area: StorageArea) {
        let _ = self.fallback.remove(&Self::cache_key(area, key));
        if let Err(e) = self.backend(area).remove(key) {
            warn!(key, error = %e, "failed to evict expired kv entry");
        }
    }
}
