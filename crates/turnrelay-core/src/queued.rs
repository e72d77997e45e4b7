//! Queued items
//!
//! A [`QueuedItem`] wraps an [`Event`] that could not be delivered on its
//! first attempt because the destination was rate limiting. The retry queue
//! owns its whole lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;
use crate::{FAILURE_RETRY_CEILING, RATE_LIMIT_RETRY_CEILING};

/// Which retry budget a failed re-attempt is charged against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryKind {
    /// The destination answered 429
    RateLimited,
    /// Any other failure
    Failed,
}

impl RetryKind {
    /// Maximum `retry_count` before an item is abandoned
    pub fn ceiling(&self) -> u32 {
        match self {
            Self::RateLimited => RATE_LIMIT_RETRY_CEILING,
            Self::Failed => FAILURE_RETRY_CEILING,
        }
    }
}

/// A persisted event plus retry bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedItem {
    /// The wrapped event
    pub event: Event,
    /// When the event was first queued
    pub enqueued_at: DateTime<Utc>,
    /// Failed re-attempts so far
    pub retry_count: u32,
    /// When the last re-attempt ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Reason of the last failed re-attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueuedItem {
    /// Wrap a freshly rate-limited event
    pub fn new(event: Event) -> Self {
        Self::enqueued_at(event, Utc::now())
    }

    /// Wrap an event with an explicit enqueue time
    pub fn enqueued_at(event: Event, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            event,
            enqueued_at,
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }

    /// Unique storage key: enqueue time in millis plus a random suffix.
    ///
    /// The zero-padded timestamp keeps a lexical listing roughly in enqueue
    /// order; the suffix rules out collisions between concurrent enqueues.
    pub fn generate_key(&self, prefix: &str) -> String {
        format!(
            "{}{:013}-{}",
            prefix,
            self.enqueued_at.timestamp_millis().max(0),
            Uuid::new_v4().simple()
        )
    }

    /// Record a failed re-attempt and report whether the item stays queued.
    ///
    /// The count is bumped first; the item survives only while the new
    /// count is still below the ceiling for `kind`.
    pub fn record_failure(&mut self, kind: RetryKind, reason: impl Into<String>) -> bool {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_attempt_at = Some(Utc::now());
        self.last_error = Some(reason.into());
        self.retry_count < kind.ceiling()
    }
}
