//! Queue errors

use turnrelay_persist::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Queue storage unavailable")]
    Unavailable,
}
