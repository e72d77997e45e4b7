//! Retry budget and sweep behavior

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use turnrelay_core::{Event, FAILURE_RETRY_CEILING, RATE_LIMIT_RETRY_CEILING};
use turnrelay_delivery::{DeliveryFailure, DeliveryOutcome, DeliveryProvider, MockProvider};
use turnrelay_persist::{MemoryBackend, StorageBackend, StorageError};
use turnrelay_queue::{RetryQueue, RetryQueueConfig, SweepReport};

fn manual_config() -> RetryQueueConfig {
    RetryQueueConfig {
        sweep_on_enqueue: false,
        ..Default::default()
    }
}

fn queue(backend: Arc<dyn StorageBackend>, provider: Arc<MockProvider>) -> Arc<RetryQueue> {
    Arc::new(RetryQueue::new(backend, provider, manual_config()))
}

#[tokio::test]
async fn rate_limited_item_dropped_exactly_at_ceiling() {
    let provider = Arc::new(MockProvider::rate_limited());
    let queue = queue(Arc::new(MemoryBackend::new()), provider.clone());
    let key = queue.enqueue(Event::named("Turn 3")).await.unwrap();

    for expected in 1..RATE_LIMIT_RETRY_CEILING {
        let report = queue.sweep().await;
        assert_eq!(report.requeued, 1, "sweep {expected} should keep the item");

        let item = queue.store().get(&key).await.unwrap().unwrap();
        assert_eq!(item.retry_count, expected);
    }

    let report = queue.sweep().await;
    assert_eq!(report.abandoned, 1);
    assert!(queue.store().get(&key).await.unwrap().is_none());
    assert_eq!(provider.calls(), RATE_LIMIT_RETRY_CEILING as usize);

    // delete is terminal
    queue.sweep().await;
    assert_eq!(provider.calls(), RATE_LIMIT_RETRY_CEILING as usize);
}

#[tokio::test]
async fn failing_item_dropped_exactly_at_ceiling() {
    let provider = Arc::new(MockProvider::failing());
    let queue = queue(Arc::new(MemoryBackend::new()), provider.clone());
    let key = queue.enqueue(Event::named("Turn 4")).await.unwrap();

    for expected in 1..FAILURE_RETRY_CEILING {
        assert_eq!(queue.sweep().await.requeued, 1);
        let item = queue.store().get(&key).await.unwrap().unwrap();
        assert_eq!(item.retry_count, expected);
    }

    assert_eq!(queue.sweep().await.abandoned, 1);
    assert_eq!(queue.depth().await.unwrap(), 0);
    assert_eq!(provider.calls(), FAILURE_RETRY_CEILING as usize);

    let metrics = queue.metrics().snapshot();
    assert_eq!(metrics.requeued, (FAILURE_RETRY_CEILING - 1) as u64);
    assert_eq!(metrics.abandoned, 1);
}

#[tokio::test]
async fn generic_failure_after_rate_limits_uses_lower_ceiling() {
    let provider = Arc::new(MockProvider::new(
        vec![
            DeliveryOutcome::RateLimited { retry_after: None },
            DeliveryOutcome::RateLimited { retry_after: None },
        ],
        DeliveryOutcome::Failed(DeliveryFailure::Transport("connection reset".into())),
    ));
    let queue = queue(Arc::new(MemoryBackend::new()), provider.clone());
    queue.enqueue(Event::named("Turn 5")).await.unwrap();

    assert_eq!(queue.sweep().await.requeued, 1);
    assert_eq!(queue.sweep().await.requeued, 1);
    assert_eq!(queue.sweep().await.abandoned, 1);
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn success_on_second_sweep_deletes_item() {
    let provider = Arc::new(MockProvider::scripted(vec![DeliveryOutcome::RateLimited {
        retry_after: Some(2),
    }]));
    let queue = queue(Arc::new(MemoryBackend::new()), provider.clone());
    let key = queue.enqueue(Event::named("Turn 6")).await.unwrap();

    let first = queue.sweep().await;
    assert_eq!(first.requeued, 1);
    let item = queue.store().get(&key).await.unwrap().unwrap();
    assert_eq!(item.last_error.as_deref(), Some("rate limited (retry after 2s)"));

    let second = queue.sweep().await;
    assert_eq!(second.delivered, 1);
    assert!(queue.store().get(&key).await.unwrap().is_none());

    let third = queue.sweep().await;
    assert_eq!(third, SweepReport::default());
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn empty_sweep_is_a_noop() {
    let provider = Arc::new(MockProvider::delivering());
    let queue = queue(Arc::new(MemoryBackend::new()), provider.clone());

    let report = queue.sweep().await;

    assert_eq!(report, SweepReport::default());
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn sweep_retries_every_item_with_its_own_event() {
    let provider = Arc::new(MockProvider::delivering());
    let queue = queue(Arc::new(MemoryBackend::new()), provider.clone());
    for n in 0..10 {
        queue.enqueue(Event::named(&format!("Turn {n}"))).await.unwrap();
    }

    let report = queue.sweep().await;

    assert_eq!(report.examined, 10);
    assert_eq!(report.delivered, 10);
    assert_eq!(queue.depth().await.unwrap(), 0);

    let mut names: Vec<String> = provider
        .received()
        .await
        .into_iter()
        .filter_map(|e| e.name)
        .collect();
    names.sort();
    let mut expected: Vec<String> = (0..10).map(|n| format!("Turn {n}")).collect();
    expected.sort();
    assert_eq!(names, expected);
}

#[tokio::test(start_paused = true)]
async fn expired_items_are_never_retried() {
    let provider = Arc::new(MockProvider::delivering());
    let queue = queue(Arc::new(MemoryBackend::new()), provider.clone());
    queue.enqueue(Event::named("Turn 7")).await.unwrap();

    tokio::time::advance(Duration::from_secs(24 * 60 * 60 + 1)).await;

    let report = queue.sweep().await;
    assert_eq!(report.examined, 0);
    assert_eq!(report.purged, 1);
    assert_eq!(provider.calls(), 0);

    // evicted, not just hidden
    assert_eq!(queue.store().backend().purge_expired().await.unwrap(), 0);
}

/// Holds the first delivery until released and answers it with 429;
/// later deliveries succeed at once.
#[derive(Debug, Default)]
struct HeldProvider {
    calls: AtomicUsize,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl DeliveryProvider for HeldProvider {
    fn name(&self) -> &str {
        "held"
    }

    async fn deliver(&self, _event: &Event) -> DeliveryOutcome {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            self.release.notified().await;
            return DeliveryOutcome::RateLimited { retry_after: None };
        }
        DeliveryOutcome::Delivered {
            id: Some("page-1".to_string()),
        }
    }
}

#[tokio::test]
async fn late_requeue_does_not_resurrect_delivered_item() {
    let provider = Arc::new(HeldProvider::default());
    let queue = Arc::new(RetryQueue::new(
        Arc::new(MemoryBackend::new()),
        provider.clone(),
        manual_config(),
    ));
    let key = queue.enqueue(Event::named("Turn 8")).await.unwrap();

    // first sweep parks inside its delivery attempt
    let slow = queue.spawn_sweep();
    provider.entered.notified().await;

    // a second sweep delivers and deletes the same item
    let fast = queue.sweep().await;
    assert_eq!(fast.delivered, 1);
    assert_eq!(queue.depth().await.unwrap(), 0);

    // the first sweep now sees 429 but must not write the item back
    provider.release.notify_one();
    let slow = slow.await.unwrap();
    assert_eq!(slow.skipped, 1);
    assert_eq!(slow.requeued, 0);

    assert!(queue.store().get(&key).await.unwrap().is_none());
    assert_eq!(queue.sweep().await.examined, 0);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    assert_eq!(queue.metrics().snapshot().requeued, 0);
}

/// Memory backend whose reads fail for chosen keys
#[derive(Debug, Default)]
struct PoisonedBackend {
    inner: MemoryBackend,
    poisoned: Mutex<HashSet<String>>,
}

#[async_trait]
impl StorageBackend for PoisonedBackend {
    fn name(&self) -> &str {
        "poisoned"
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
        self.inner.set_value(key, value, ttl).await
    }

    async fn replace_value(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<bool, StorageError> {
        self.inner.replace_value(key, value, ttl).await
    }

    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        if self.poisoned.lock().await.contains(key) {
            return Err(StorageError::Connection("disk on fire".to_string()));
        }
        self.inner.get_value(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.exists(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list_keys(prefix).await
    }

    async fn purge_expired(&self) -> Result<u64, StorageError> {
        self.inner.purge_expired().await
    }
}

#[tokio::test]
async fn poison_item_does_not_stall_others() {
    let backend = Arc::new(PoisonedBackend::default());
    let provider = Arc::new(MockProvider::delivering());
    let queue = queue(backend.clone(), provider.clone());

    let bad = queue.enqueue(Event::named("Bad turn")).await.unwrap();
    let good = queue.enqueue(Event::named("Good turn")).await.unwrap();
    backend.poisoned.lock().await.insert(bad.clone());

    let report = queue.sweep().await;

    assert_eq!(report.examined, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(provider.calls(), 1);

    // the poisoned item keeps its last persisted state
    assert!(backend.inner.exists(&bad).await.unwrap());
    assert!(!backend.inner.exists(&good).await.unwrap());

    backend.poisoned.lock().await.clear();
    let retry = queue.sweep().await;
    assert_eq!(retry.delivered, 1);
    assert_eq!(queue.depth().await.unwrap(), 0);
}
