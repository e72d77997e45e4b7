//! Storage backend trait and error types

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Key/value backend with per-record TTL (Object Safe)
///
/// Single-key operations are atomic. Nothing spanning several calls is.
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Check if backend is healthy
    async fn is_healthy(&self) -> bool;

    /// Store a JSON value, replacing any previous one and its TTL
    async fn set_value(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError>;

    /// Overwrite a live record and its TTL.
    ///
    /// Returns `false` without writing when the key is missing or expired;
    /// a deleted record is never recreated.
    async fn replace_value(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError>;

    /// Get a JSON value by key; expired records read as absent
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Delete a value by key
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Check if an unexpired key exists
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// List all unexpired keys with prefix
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Physically drop expired records, returning how many went
    async fn purge_expired(&self) -> Result<u64, StorageError>;
}

/// Extension trait for typed access
#[async_trait]
pub trait StorageExt {
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError>;
    async fn replace<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError>;
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError>;
}

#[async_trait]
impl<S: StorageBackend + ?Sized> StorageExt for S {
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let json =
            serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.set_value(key, json, ttl).await
    }

    async fn replace<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        let json =
            serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.replace_value(key, json, ttl).await
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get_value(key).await? {
            Some(json) => {
                let value = serde_json::from_value(json)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: serde_json::Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<HashMap<String, Entry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn set_value(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.data
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn replace_value(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        let now = Instant::now();
        let mut data = self.data.write().await;
        match data.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.value = value;
                entry.expires_at = ttl.map(|ttl| now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let now = Instant::now();
        let data = self.data.read().await;
        Ok(data
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let now = Instant::now();
        let removed = self.data.write().await.remove(key);
        Ok(removed.is_some_and(|e| e.is_live(now)))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let now = Instant::now();
        let data = self.data.read().await;
        Ok(data.get(key).is_some_and(|e| e.is_live(now)))
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let now = Instant::now();
        let data = self.data.read().await;
        let mut keys: Vec<String> = data
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn purge_expired(&self) -> Result<u64, StorageError> {
        let now = Instant::now();
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|_, e| e.is_live(now));
        Ok((before - data.len()) as u64)
    }
}
