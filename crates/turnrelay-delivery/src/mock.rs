//! Mock delivery provider for testing

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use turnrelay_core::Event;

use crate::provider::{DeliveryFailure, DeliveryOutcome, DeliveryProvider};

/// A provider that replays scripted outcomes and counts calls.
///
/// Scripted outcomes are consumed in order; once the script is empty every
/// call returns the fallback.
#[derive(Debug)]
pub struct MockProvider {
    script: Mutex<VecDeque<DeliveryOutcome>>,
    fallback: DeliveryOutcome,
    calls: AtomicUsize,
    received: Mutex<Vec<Event>>,
}

impl MockProvider {
    /// Play `script`, then fall back to `fallback`
    pub fn new(script: Vec<DeliveryOutcome>, fallback: DeliveryOutcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Always delivers
    pub fn delivering() -> Self {
        Self::constant(DeliveryOutcome::Delivered {
            id: Some("mock-page".to_string()),
        })
    }

    /// Always returns the same outcome
    pub fn constant(outcome: DeliveryOutcome) -> Self {
        Self::new(Vec::new(), outcome)
    }

    /// Always rate limited
    pub fn rate_limited() -> Self {
        Self::constant(DeliveryOutcome::RateLimited { retry_after: None })
    }

    /// Always fails with an HTTP 500
    pub fn failing() -> Self {
        Self::constant(DeliveryOutcome::Failed(DeliveryFailure::Status {
            status: 500,
            body: "mock failure".to_string(),
        }))
    }

    /// Play `script`, then deliver
    pub fn scripted(script: Vec<DeliveryOutcome>) -> Self {
        Self::new(
            script,
            DeliveryOutcome::Delivered {
                id: Some("mock-page".to_string()),
            },
        )
    }

    /// Number of `deliver` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Events seen, in call order
    pub async fn received(&self) -> Vec<Event> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl DeliveryProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn deliver(&self, event: &Event) -> DeliveryOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().await.push(event.clone());

        let next = self.script.lock().await.pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let mock = MockProvider::scripted(vec![
            DeliveryOutcome::RateLimited { retry_after: Some(3) },
            DeliveryOutcome::Failed(DeliveryFailure::Transport("reset".to_string())),
        ]);
        let event = Event::named("Turn 1");

        assert_eq!(
            mock.deliver(&event).await,
            DeliveryOutcome::RateLimited { retry_after: Some(3) }
        );
        assert_eq!(mock.deliver(&event).await.label(), "failed");
        assert_eq!(mock.deliver(&event).await.label(), "delivered");
        assert_eq!(mock.deliver(&event).await.label(), "delivered");

        assert_eq!(mock.calls(), 4);
        assert_eq!(mock.received().await.len(), 4);
    }
}
