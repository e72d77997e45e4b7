//! Application State

use std::sync::Arc;
use turnrelay_queue::{Metrics, TurnRelay};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    relay: Arc<TurnRelay>,
}

impl AppState {
    pub fn new(relay: Arc<TurnRelay>) -> Self {
        Self { relay }
    }

    /// Get the relay (cloned Arc for sharing)
    pub fn relay(&self) -> Arc<TurnRelay> {
        self.relay.clone()
    }

    /// Get metrics collector (cloned Arc for sharing)
    pub fn metrics(&self) -> Arc<Metrics> {
        self.relay.metrics().clone()
    }
}
