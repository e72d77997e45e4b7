//! Retry queue manager
//!
//! Owns every [`QueuedItem`] from enqueue to deletion. A sweep re-attempts
//! each persisted item once and then deletes it (delivered, or out of
//! budget) or writes it back with its retry count bumped and TTL refreshed.
//!
//! Sweeps take no locks. Two sweeps running at once may both re-attempt the
//! same item; delivery is at-least-once. Write-backs only update an item
//! that is still stored, so an item deleted by one sweep stays deleted.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use turnrelay_core::{Event, QueuedItem, RetryKind, QUEUED_ITEM_TTL_SECS};
use turnrelay_delivery::{DeliveryOutcome, DeliveryProvider};
use turnrelay_persist::queue_store::DEFAULT_PREFIX;
use turnrelay_persist::{QueueStore, StorageBackend};

use crate::error::QueueError;
use crate::metrics::Metrics;

#[derive(Debug, Clone)]
pub struct RetryQueueConfig {
    /// Key prefix for queued items
    pub prefix: String,
    /// Lifetime of an item since its last write
    pub ttl: Duration,
    /// Items re-attempted at once within a sweep
    pub concurrency: usize,
    /// Spawn a sweep after every enqueue
    pub sweep_on_enqueue: bool,
    /// Period of the background sweep; none unless set
    pub sweep_interval: Option<Duration>,
}

impl Default for RetryQueueConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            ttl: Duration::from_secs(QUEUED_ITEM_TTL_SECS),
            concurrency: 4,
            sweep_on_enqueue: true,
            sweep_interval: None,
        }
    }
}

impl RetryQueueConfig {
    /// Defaults, overridden by `TURNRELAY_SWEEP_INTERVAL_SECS` and
    /// `TURNRELAY_SWEEP_CONCURRENCY`. Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env::var("TURNRELAY_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            config.sweep_interval = Some(Duration::from_secs(secs));
        }

        if let Some(concurrency) = env::var("TURNRELAY_SWEEP_CONCURRENCY")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
        {
            config.concurrency = concurrency;
        }

        config
    }
}

/// What a sweep did with one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Delivered and deleted
    Delivered,
    /// Failed again, written back
    Requeued,
    /// Failed again and out of budget, deleted
    Abandoned,
    /// Gone before it could be read or written back
    Skipped,
}

/// Tally of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub delivered: usize,
    pub requeued: usize,
    pub abandoned: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Expired records evicted from storage
    pub purged: u64,
}

impl SweepReport {
    fn tally(&mut self, result: &Result<ItemOutcome, QueueError>) {
        match result {
            Ok(ItemOutcome::Delivered) => self.delivered += 1,
            Ok(ItemOutcome::Requeued) => self.requeued += 1,
            Ok(ItemOutcome::Abandoned) => self.abandoned += 1,
            Ok(ItemOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.errors += 1,
        }
    }
}

/// Durable retry queue
#[derive(Debug)]
pub struct RetryQueue {
    store: QueueStore<dyn StorageBackend>,
    provider: Arc<dyn DeliveryProvider>,
    metrics: Arc<Metrics>,
    config: RetryQueueConfig,
}

impl RetryQueue {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        provider: Arc<dyn DeliveryProvider>,
        config: RetryQueueConfig,
    ) -> Self {
        let store = QueueStore::new(backend)
            .with_prefix(&config.prefix)
            .with_ttl(config.ttl);

        Self {
            store,
            provider,
            metrics: Arc::new(Metrics::new()),
            config,
        }
    }

    /// Share a metrics collector
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &RetryQueueConfig {
        &self.config
    }

    pub fn store(&self) -> &QueueStore<dyn StorageBackend> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Persist a rate-limited event with `retry_count = 0`.
    ///
    /// Does not sweep; callers trigger that separately.
    pub async fn enqueue(&self, event: Event) -> Result<String, QueueError> {
        let item = QueuedItem::new(event);
        let key = self.store.insert(&item).await?;
        self.metrics.record_queued();

        info!(key = %key, name = ?item.event.name, "Queued rate-limited turn");
        Ok(key)
    }

    /// Number of live queued items
    pub async fn depth(&self) -> Result<usize, QueueError> {
        Ok(self.store.depth().await?)
    }

    /// Re-attempt every queued item once.
    ///
    /// Errors on one item are logged and counted; the item keeps its last
    /// persisted state and the sweep moves on.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.store.backend().purge_expired().await {
            Ok(purged) => {
                report.purged = purged;
                if purged > 0 {
                    debug!(purged, "Evicted expired queue records");
                }
            }
            Err(e) => warn!(error = %e, "Failed to purge expired queue records"),
        }

        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                error!(error = %e, "Failed to list queued items");
                report.errors += 1;
                return report;
            }
        };
        report.examined = keys.len();

        if keys.is_empty() {
            debug!("Retry queue empty, nothing to sweep");
            return report;
        }

        let results: Vec<(String, Result<ItemOutcome, QueueError>)> = stream::iter(keys)
            .map(|key| async move {
                let result = self.process_item(&key).await;
                (key, result)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for (key, result) in &results {
            if let Err(e) = result {
                warn!(key = %key, error = %e, "Failed to process queued item");
            }
            report.tally(result);
        }

        self.metrics.record_sweep();
        info!(
            examined = report.examined,
            delivered = report.delivered,
            requeued = report.requeued,
            abandoned = report.abandoned,
            skipped = report.skipped,
            errors = report.errors,
            purged = report.purged,
            "Sweep finished"
        );
        report
    }

    /// Re-attempt one item and settle it
    pub async fn process_item(&self, key: &str) -> Result<ItemOutcome, QueueError> {
        let Some(mut item) = self.store.get(key).await? else {
            debug!(key = %key, "Queued item vanished before retry");
            return Ok(ItemOutcome::Skipped);
        };

        let outcome = self.provider.deliver(&item.event).await;
        self.metrics.record_attempt(&outcome);

        match outcome {
            DeliveryOutcome::Delivered { id } => {
                self.store.delete(key).await?;
                info!(key = %key, page_id = ?id, retry_count = item.retry_count, "Queued turn delivered");
                Ok(ItemOutcome::Delivered)
            }
            DeliveryOutcome::RateLimited { retry_after } => {
                let reason = match retry_after {
                    Some(secs) => format!("rate limited (retry after {secs}s)"),
                    None => "rate limited".to_string(),
                };
                self.settle(key, &mut item, RetryKind::RateLimited, reason)
                    .await
            }
            DeliveryOutcome::Failed(failure) => {
                self.settle(key, &mut item, RetryKind::Failed, failure.to_string())
                    .await
            }
        }
    }

    async fn settle(
        &self,
        key: &str,
        item: &mut QueuedItem,
        kind: RetryKind,
        reason: String,
    ) -> Result<ItemOutcome, QueueError> {
        if item.record_failure(kind, reason) {
            if !self.store.replace(key, item).await? {
                debug!(key = %key, "Queued item settled elsewhere, not written back");
                return Ok(ItemOutcome::Skipped);
            }
            self.metrics.record_requeued();
            debug!(
                key = %key,
                retry_count = item.retry_count,
                kind = ?kind,
                "Queued turn retry failed, kept"
            );
            Ok(ItemOutcome::Requeued)
        } else {
            self.store.delete(key).await?;
            self.metrics.record_abandoned();
            warn!(
                key = %key,
                retry_count = item.retry_count,
                kind = ?kind,
                last_error = ?item.last_error,
                "Queued turn out of retries, dropped"
            );
            Ok(ItemOutcome::Abandoned)
        }
    }

    /// Run one sweep in the background
    pub fn spawn_sweep(self: &Arc<Self>) -> JoinHandle<SweepReport> {
        let queue = self.clone();
        tokio::spawn(async move { queue.sweep().await })
    }

    /// Sweep every `interval` until the handle is aborted
    pub fn spawn_periodic(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Periodic sweep started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                queue.sweep().await;
            }
        })
    }
}
