//! Persistent key-value storage for the active page and the saved pad slots.
//!
//! The engine only relies on the [`Storage`] capability; which backend it gets is decided where
//! the engine is built. Values are stored as JSON.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::Result;

/// Key of the last active page
pub const PAGE_KEY: &str = "page";

/// Key of the play context saved on right-column button `position`
pub fn item_key(position: u8) -> String {
    format!("Item index {}", position)
}

/// Key of the song saved on page-3 pad `position`
pub fn song_key(position: u8) -> String {
    format!("Song index {}", position)
}

pub trait Storage: Send + Sync + 'static {
    /// The value stored under `key`, if any
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    fn set(&self, key: &str, value: Value) -> impl Future<Output = Result<()>> + Send;

    /// Deleting a missing key is not an error
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Fetch and deserialize the value under `key`
    fn get_value<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<T>>> + Send {
        async move {
            match self.get(key).await? {
                None | Some(Value::Null) => Ok(None),
                Some(value) => Ok(Some(serde_json::from_value(value)?)),
            }
        }
    }

    /// Like [`Storage::get_value`], falling back to `default` when nothing is stored
    fn get_or<T: DeserializeOwned + Send>(
        &self,
        key: &str,
        default: T,
    ) -> impl Future<Output = Result<T>> + Send {
        async move { Ok(self.get_value(key).await?.unwrap_or(default)) }
    }

    fn set_value<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            let value = serde_json::to_value(value)?;
            self.set(key, value).await
        }
    }
}

/// Keeps everything in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values().insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values().remove(key);
        Ok(())
    }
}

/// Stores all keys in one JSON object on disk. The file is created on the first write.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // serializes read-modify-write cycles
    lock: tokio::sync::Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn store(&self, values: &Map<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(values)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        values.insert(key.to_owned(), value);
        self.store(&values).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut values = self.load().await?;
        if values.remove(key).is_some() {
            self.store(&values).await?;
        }
        Ok(())
    }
}
