//! # Turnrelay API
//!
//! HTTP surface for the turn relay.
//!
//! Features:
//! - Axum-based web server
//! - Inbound turn endpoint with tri-state answers (201 / 202 / error)
//! - Queue inspection and manual sweep
//! - Health and Prometheus metrics
//! - Graceful shutdown

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::{RelayServer, ServerConfig};
pub use state::AppState;
