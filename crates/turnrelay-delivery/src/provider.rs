//! Delivery provider trait and outcome types

use async_trait::async_trait;
use thiserror::Error;
use turnrelay_core::Event;

/// Why a delivery attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    /// Access token or destination id missing; no request was sent
    #[error("credentials not configured")]
    NotConfigured,
    /// The API answered with a non-2xx status other than 429
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The request never produced a response
    #[error("{0}")]
    Transport(String),
}

impl DeliveryFailure {
    /// Configuration errors are fatal per attempt and not transient
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured)
    }
}

/// Classified result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Record created; `id` is the identifier from the response body when present
    Delivered { id: Option<String> },
    /// HTTP 429; `retry_after` is the advisory hint in seconds
    RateLimited { retry_after: Option<u64> },
    /// Anything else
    Failed(DeliveryFailure),
}

impl DeliveryOutcome {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::RateLimited { .. } => "rate_limited",
            Self::Failed(_) => "failed",
        }
    }
}

/// One outbound call per `deliver`, no internal retries
#[async_trait]
pub trait DeliveryProvider: Send + Sync + std::fmt::Debug {
    /// Provider name
    fn name(&self) -> &str;

    /// Deliver a single event.
    ///
    /// Never errors: every failure mode is folded into
    /// [`DeliveryOutcome::Failed`] or [`DeliveryOutcome::RateLimited`].
    async fn deliver(&self, event: &Event) -> DeliveryOutcome;
}
