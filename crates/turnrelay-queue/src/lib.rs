//! # Turnrelay Queue
//!
//! Retry queue for turn deliveries the destination rate limited.
//!
//! Features:
//! - [`TurnRelay`]: inbound entry point (deliver now, else queue)
//! - [`RetryQueue`]: enqueue, sweep, background sweeps
//! - Separate retry budgets for rate limiting and other failures
//! - [`Metrics`] counters with Prometheus export

pub mod error;
pub mod manager;
pub mod metrics;
pub mod relay;

pub use error::QueueError;
pub use manager::{ItemOutcome, RetryQueue, RetryQueueConfig, SweepReport};
pub use metrics::{Metrics, MetricsSnapshot};
pub use relay::{SubmitOutcome, TurnRelay};
