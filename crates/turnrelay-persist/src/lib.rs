//! # Turnrelay Persistence
//!
//! Key/value storage for queued deliveries.
//!
//! Supports:
//! - In-memory (for testing and single-process deployments)
//! - SQLite (durable, single-node)
//!
//! Every record may carry a TTL. Expired records are invisible to reads and
//! listings; eviction is the backend's job, not the caller's.

pub mod backend;
pub mod queue_store;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use backend::{MemoryBackend, StorageBackend, StorageError, StorageExt};
pub use queue_store::QueueStore;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteBackend, SqliteConfig};
