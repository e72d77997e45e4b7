//! Delivery and queue metrics

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use turnrelay_delivery::DeliveryOutcome;

/// Process-wide counters
#[derive(Debug, Default)]
pub struct Metrics {
    /// Delivery attempts, first tries and re-attempts
    pub attempts: AtomicU64,
    /// Attempts that created a record
    pub delivered: AtomicU64,
    /// Attempts answered with 429
    pub rate_limited: AtomicU64,
    /// Attempts that failed otherwise
    pub failed: AtomicU64,
    /// Items added to the queue
    pub queued: AtomicU64,
    /// Items written back after a failed re-attempt
    pub requeued: AtomicU64,
    /// Items dropped after exhausting their budget
    pub abandoned: AtomicU64,
    /// Completed sweeps
    pub sweeps: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one delivery attempt by outcome
    pub fn record_attempt(&self, outcome: &DeliveryOutcome) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            DeliveryOutcome::Delivered { .. } => &self.delivered,
            DeliveryOutcome::RateLimited { .. } => &self.rate_limited,
            DeliveryOutcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweep(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub attempts: u64,
    pub delivered: u64,
    pub rate_limited: u64,
    pub failed: u64,
    pub queued: u64,
    pub requeued: u64,
    pub abandoned: u64,
    pub sweeps: u64,
}

impl MetricsSnapshot {
    /// Export metrics in Prometheus text format
    pub fn to_prometheus(&self) -> String {
        let counters = [
            ("turnrelay_delivery_attempts_total", "Delivery attempts", self.attempts),
            ("turnrelay_delivered_total", "Events delivered", self.delivered),
            ("turnrelay_rate_limited_total", "Attempts answered with 429", self.rate_limited),
            ("turnrelay_failed_total", "Attempts that failed", self.failed),
            ("turnrelay_queued_total", "Events queued for retry", self.queued),
            ("turnrelay_requeued_total", "Queued items written back after a failed retry", self.requeued),
            ("turnrelay_abandoned_total", "Queued items dropped after exhausting retries", self.abandoned),
            ("turnrelay_sweeps_total", "Completed queue sweeps", self.sweeps),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!("# HELP {name} {help}\n"));
            output.push_str(&format!("# TYPE {name} counter\n"));
            output.push_str(&format!("{name} {value}\n"));
        }
        output
    }
}
