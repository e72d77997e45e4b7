//! # Turnrelay Core
//!
//! Core types shared by the relay crates:
//! - [`Event`]: a resolved game turn to be relayed
//! - [`QueuedItem`]: a persisted event plus retry bookkeeping
//! - [`RetryKind`]: which retry budget a failed re-attempt draws from

pub mod event;
pub mod queued;

pub use event::Event;
pub use queued::{QueuedItem, RetryKind};

/// Retry ceiling for re-attempts that keep getting rate limited.
pub const RATE_LIMIT_RETRY_CEILING: u32 = 5;

/// Retry ceiling for re-attempts that fail for any other reason.
pub const FAILURE_RETRY_CEILING: u32 = 3;

/// Lifetime of a persisted item since its last write.
pub const QUEUED_ITEM_TTL_SECS: u64 = 24 * 60 * 60;
