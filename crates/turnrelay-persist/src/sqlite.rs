//! SQLite backend implementation

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::backend::{StorageBackend, StorageError};

/// SQLite configuration options
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database URL (e.g., "sqlite:turnrelay.db?mode=rwc" or "sqlite::memory:")
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Enable WAL journal mode for better concurrency
    pub wal_mode: bool,
    /// Busy timeout in seconds
    pub busy_timeout_secs: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:turnrelay.db?mode=rwc".to_string(),
            max_connections: 5,
            wal_mode: true,
            busy_timeout_secs: 30,
        }
    }
}

impl SqliteConfig {
    /// Create config for in-memory database (testing)
    pub fn memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            wal_mode: false,
            busy_timeout_secs: 5,
        }
    }

    fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// SQLite storage backend
#[derive(Debug)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Create a new SQLite backend with default config
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        let config = if url.contains(":memory:") {
            SqliteConfig {
                url: url.to_string(),
                ..SqliteConfig::memory()
            }
        } else {
            SqliteConfig {
                url: url.to_string(),
                ..Default::default()
            }
        };
        Self::new_with_config(config).await
    }

    /// Create a new SQLite backend with full configuration
    pub async fn new_with_config(config: SqliteConfig) -> Result<Self, StorageError> {
        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        options = options.pragma("busy_timeout", (config.busy_timeout_secs * 1000).to_string());
        if config.wal_mode {
            options = options.pragma("journal_mode", "WAL");
        }

        // Every connection to ":memory:" is its own database; pin exactly one.
        let mut pool_options = SqlitePoolOptions::new();
        pool_options = if config.is_memory() {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(config.max_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        info!(url = %config.url, wal = config.wal_mode, "Connected to SQLite");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::Internal(format!("Migration failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Escape LIKE wildcards so prefixes match literally.
///
/// LIKE ignores ASCII case; `list_keys` also compares the prefix exactly.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn is_healthy(&self) -> bool {
        if self.pool.is_closed() {
            return false;
        }
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn set_value(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(&value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let now = now_millis();
        let expires_at = ttl.map(|ttl| now.saturating_add(ttl.as_millis() as i64));

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, created_at, updated_at, expires_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(json)
        .bind(now)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    async fn replace_value(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        let json = serde_json::to_string(&value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let now = now_millis();
        let expires_at = ttl.map(|ttl| now.saturating_add(ttl.as_millis() as i64));

        let result = sqlx::query(
            r#"
            UPDATE kv_store
            SET value = ?, updated_at = ?, expires_at = ?
            WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(json)
        .bind(now)
        .bind(expires_at)
        .bind(key)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let result = sqlx::query(
            "SELECT value FROM kv_store WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        match result {
            Some(row) => {
                let value_str: String = row
                    .try_get("value")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                let value = serde_json::from_str(&value_str)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "DELETE FROM kv_store WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(now_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "SELECT 1 FROM kv_store WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.is_some())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT key FROM kv_store
            WHERE key LIKE ?1 ESCAPE '\'
              AND substr(key, 1, length(?2)) = ?2
              AND (expires_at IS NULL OR expires_at > ?3)
            ORDER BY key
            "#,
        )
        .bind(like_prefix(prefix))
        .bind(prefix)
        .bind(now_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row
                .try_get("key")
                .map_err(|e| StorageError::Query(e.to_string()))?;
            keys.push(key);
        }
        Ok(keys)
    }

    async fn purge_expired(&self) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM kv_store WHERE expires_at IS NOT NULL AND expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
