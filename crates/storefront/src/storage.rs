//! Per-client key-value storage.
//!
//! The role cache entry and the anonymous cart live in storage scoped to one
//! client rather than one user. In production that is the `tower-sessions`
//! session (cookie + `PostgreSQL` row); in tests it is a [`MemoryStorage`].
//! Values are stored as JSON.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;
use tower_sessions::Session;

/// Errors from client storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The session backend failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// A value could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A key-value store scoped to a single client.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`.
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Overwrite the value under `key`.
    async fn save(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove `key` if present.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a typed value.
///
/// # Errors
///
/// Returns `StorageError::Serialization` when the stored JSON does not match `T`.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.load(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Encode and write a typed value.
///
/// # Errors
///
/// Returns a `StorageError` if encoding or the write fails.
pub async fn save_json<T: Serialize + Sync + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    store.save(key, serde_json::to_value(value)?).await
}

#[async_trait]
impl KeyValueStore for Session {
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.get_value(key).await?)
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.insert_value(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.remove_value(key).await?;
        Ok(())
    }
}

/// In-process storage, one instance per simulated client.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` currently holds a value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    async fn save(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
