//! Per-User Key-Value Store
//!
//! Namespaced JSON values persisted for the current user. Local analysis and
//! plugin definitions and model bindings live here.
//!
//! The file layout is `{ "<namespace>": { "<key>": <value> } }`.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{ensure_codeask_dir, store_path};

/// Namespaced key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> AppResult<Option<Value>>;

    fn set(&self, namespace: &str, key: &str, value: Value) -> AppResult<()>;

    fn delete(&self, namespace: &str, key: &str) -> AppResult<()>;
}

/// Read and deserialize a value. Missing keys yield `None`.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    namespace: &str,
    key: &str,
) -> AppResult<Option<T>> {
    match store.get(namespace, key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and write a value.
pub fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    namespace: &str,
    key: &str,
    value: &T,
) -> AppResult<()> {
    store.set(namespace, key, serde_json::to_value(value)?)
}

fn lock_poisoned() -> AppError {
    AppError::internal("key-value store lock poisoned")
}

// ============================================================================
// JSON file store
// ============================================================================

/// Key-value store persisted as one JSON file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the default store at `~/.codeask/store.json`
    pub fn open_default() -> AppResult<Self> {
        ensure_codeask_dir()?;
        Self::open(store_path()?)
    }

    /// Open a store file, starting empty if it does not exist yet
    pub fn open(path: PathBuf) -> AppResult<Self> {
        let data = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                _ => {
                    return Err(AppError::persistence(format!(
                        "{} is not a JSON object",
                        path.display()
                    )))
                }
            }
        } else {
            Map::new()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Atomic write: temp file in the same directory, fsync, rename
    fn flush(&self, data: &Map<String, Value>) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");

        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(AppError::persistence(format!(
                "failed to write {}: {}",
                self.path.display(),
                e
            )));
        }

        debug!(path = %self.path.display(), "key-value store flushed");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, namespace: &str, key: &str) -> AppResult<Option<Value>> {
        let data = self.data.lock().map_err(|_| lock_poisoned())?;
        Ok(data
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    fn set(&self, namespace: &str, key: &str, value: Value) -> AppResult<()> {
        let mut data = self.data.lock().map_err(|_| lock_poisoned())?;
        let mut next = data.clone();
        let entry = next
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(ns) = entry {
            ns.insert(key.to_string(), value);
        }
        self.flush(&next)?;
        *data = next;
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> AppResult<()> {
        let mut data = self.data.lock().map_err(|_| lock_poisoned())?;
        let mut next = data.clone();
        let removed = match next.get_mut(namespace) {
            Some(Value::Object(ns)) => ns.remove(key).is_some(),
            _ => false,
        };
        if removed {
            self.flush(&next)?;
            *data = next;
        }
        Ok(())
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    data: Mutex<HashMap<(String, String), Value>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, namespace: &str, key: &str) -> AppResult<Option<Value>> {
        let data = self.data.lock().map_err(|_| lock_poisoned())?;
        Ok(data.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    fn set(&self, namespace: &str, key: &str, value: Value) -> AppResult<()> {
        let mut data = self.data.lock().map_err(|_| lock_poisoned())?;
        data.insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> AppResult<()> {
        let mut data = self.data.lock().map_err(|_| lock_poisoned())?;
        data.remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}
