//! Inbound entry point

use std::sync::Arc;
use tracing::{info, warn};
use turnrelay_core::Event;
use turnrelay_delivery::{DeliveryFailure, DeliveryOutcome, DeliveryProvider};

use crate::error::QueueError;
use crate::manager::RetryQueue;
use crate::metrics::Metrics;

/// Immediate answer for one inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Delivered on the first attempt
    Delivered { id: Option<String> },
    /// Rate limited and persisted for retry
    Queued { key: String },
    /// Rate limited and could not be queued
    RateLimited { retry_after: Option<u64> },
    /// Failed; never queued
    Failed(DeliveryFailure),
}

/// Delivers inbound events, deferring rate-limited ones to the retry queue
#[derive(Debug, Clone)]
pub struct TurnRelay {
    provider: Arc<dyn DeliveryProvider>,
    queue: Option<Arc<RetryQueue>>,
    metrics: Arc<Metrics>,
}

impl TurnRelay {
    /// Relay without a queue; rate-limited events are reported, not kept
    pub fn new(provider: Arc<dyn DeliveryProvider>) -> Self {
        Self {
            provider,
            queue: None,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Attach a retry queue, sharing its metrics
    pub fn with_queue(mut self, queue: Arc<RetryQueue>) -> Self {
        self.metrics = queue.metrics().clone();
        self.queue = Some(queue);
        self
    }

    pub fn provider(&self) -> &Arc<dyn DeliveryProvider> {
        &self.provider
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// The retry queue, if storage came up
    pub fn queue(&self) -> Result<&Arc<RetryQueue>, QueueError> {
        self.queue.as_ref().ok_or(QueueError::Unavailable)
    }

    /// Attempt delivery once; on 429 queue the event and kick off a
    /// background sweep without waiting for it.
    pub async fn submit(&self, event: Event) -> SubmitOutcome {
        let event = event.normalized();
        let outcome = self.provider.deliver(&event).await;
        self.metrics.record_attempt(&outcome);

        match outcome {
            DeliveryOutcome::Delivered { id } => {
                info!(page_id = ?id, "Turn delivered");
                SubmitOutcome::Delivered { id }
            }
            DeliveryOutcome::Failed(failure) => {
                warn!(error = %failure, "Turn delivery failed");
                SubmitOutcome::Failed(failure)
            }
            DeliveryOutcome::RateLimited { retry_after } => {
                let Some(queue) = &self.queue else {
                    warn!("Turn rate limited and no retry queue available; not queued");
                    return SubmitOutcome::RateLimited { retry_after };
                };

                match queue.enqueue(event).await {
                    Ok(key) => {
                        if queue.config().sweep_on_enqueue {
                            queue.spawn_sweep();
                        }
                        SubmitOutcome::Queued { key }
                    }
                    Err(e) => {
                        warn!(error = %e, "Turn rate limited and could not be queued");
                        SubmitOutcome::RateLimited { retry_after }
                    }
                }
            }
        }
    }
}
