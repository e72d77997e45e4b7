//! Queued item storage

use std::sync::Arc;
use std::time::Duration;
use turnrelay_core::{QueuedItem, QUEUED_ITEM_TTL_SECS};

use crate::backend::{StorageBackend, StorageError, StorageExt};

/// Default key prefix for queued items
pub const DEFAULT_PREFIX: &str = "retry:";

/// Typed view of the queued items in a backend.
///
/// Every write refreshes the item's TTL, so an item lives for the TTL
/// after its most recent persist.
#[derive(Debug)]
pub struct QueueStore<B: StorageBackend + ?Sized> {
    backend: Arc<B>,
    prefix: String,
    ttl: Duration,
}

impl<B: StorageBackend + ?Sized> Clone for QueueStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            prefix: self.prefix.clone(),
            ttl: self.ttl,
        }
    }
}

impl<B: StorageBackend + ?Sized> QueueStore<B> {
    /// Create a new queue store
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            prefix: DEFAULT_PREFIX.to_string(),
            ttl: Duration::from_secs(QUEUED_ITEM_TTL_SECS),
        }
    }

    /// Create with custom prefix
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Create with custom TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Key prefix in use
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// TTL applied on every write
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Underlying backend
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Persist a new item under a freshly generated key
    pub async fn insert(&self, item: &QueuedItem) -> Result<String, StorageError> {
        let key = item.generate_key(&self.prefix);
        self.put(&key, item).await?;
        Ok(key)
    }

    /// Overwrite an item, refreshing its TTL
    pub async fn put(&self, key: &str, item: &QueuedItem) -> Result<(), StorageError> {
        self.backend.set(key, item, Some(self.ttl)).await
    }

    /// Write back an item that is still queued, refreshing its TTL.
    ///
    /// Returns `false` when the item was deleted or expired meanwhile; it
    /// is not recreated.
    pub async fn replace(&self, key: &str, item: &QueuedItem) -> Result<bool, StorageError> {
        self.backend.replace(key, item, Some(self.ttl)).await
    }

    /// Load an item; `None` once deleted or expired
    pub async fn get(&self, key: &str) -> Result<Option<QueuedItem>, StorageError> {
        self.backend.get(key).await
    }

    /// Delete an item
    pub async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.backend.delete(key).await
    }

    /// Keys of all live items
    pub async fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.backend.list_keys(&self.prefix).await
    }

    /// Number of live items
    pub async fn depth(&self) -> Result<usize, StorageError> {
        Ok(self.keys().await?.len())
    }

    /// Load every live item with its key
    pub async fn load_all(&self) -> Result<Vec<(String, QueuedItem)>, StorageError> {
        let keys = self.keys().await?;
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(item) = self.get(&key).await? {
                items.push((key, item));
            }
        }
        Ok(items)
    }

    /// Check backend health
    pub async fn is_healthy(&self) -> bool {
        self.backend.is_healthy().await
    }
}
