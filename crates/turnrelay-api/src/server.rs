//! Relay server with graceful shutdown

use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use turnrelay_delivery::{DeliveryProvider, NotesConfig, NotionProvider};
use turnrelay_persist::{MemoryBackend, SqliteBackend, StorageBackend};
use turnrelay_queue::{RetryQueue, RetryQueueConfig, TurnRelay};

use crate::error::ApiError;
use crate::middleware::{
    body_limit_layer, request_id_middleware, timeout_layer, tracing_middleware,
};
use crate::routes::api_router;
use crate::state::AppState;

/// Default queue database
pub const DEFAULT_DATABASE_URL: &str = "sqlite:turnrelay.db?mode=rwc";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server address
    pub addr: SocketAddr,
    /// Request timeout
    pub timeout: Duration,
    /// Max request body size (bytes)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            timeout: Duration::from_secs(30),
            max_body_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("TURNRELAY_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let timeout_secs: u64 = std::env::var("TURNRELAY_TIMEOUT_SECS")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(30);

        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            timeout: Duration::from_secs(timeout_secs),
            ..Default::default()
        }
    }
}

/// Open the queue storage named by the environment.
///
/// `None` when it cannot be opened; the relay then runs without a queue.
pub async fn open_storage() -> Option<Arc<dyn StorageBackend>> {
    if std::env::var("TURNRELAY_STORAGE").is_ok_and(|v| v.eq_ignore_ascii_case("memory")) {
        tracing::warn!("Using in-memory queue storage; queued turns are lost on restart");
        return Some(Arc::new(MemoryBackend::new()));
    }

    let db_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

    match SqliteBackend::new(&db_url).await {
        Ok(backend) => {
            match backend.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Purged expired queue records"),
                Err(e) => tracing::warn!(error = %e, "Failed to purge expired queue records"),
            }
            Some(Arc::new(backend))
        }
        Err(e) => {
            tracing::error!(error = %e, "Queue storage unavailable; rate-limited turns will not be queued");
            None
        }
    }
}

/// Relay API Server
pub struct RelayServer {
    config: ServerConfig,
    app_state: AppState,
}

impl RelayServer {
    /// Create a server from the environment
    pub async fn new(config: ServerConfig) -> Result<Self, ApiError> {
        let notes = NotesConfig::from_env()?;
        let provider: Arc<dyn DeliveryProvider> = Arc::new(NotionProvider::new(&notes)?);

        let mut relay = TurnRelay::new(provider.clone());
        if let Some(backend) = open_storage().await {
            tracing::info!(backend = backend.name(), "Retry queue ready");
            let queue = RetryQueue::new(backend, provider, RetryQueueConfig::from_env());
            relay = relay.with_queue(Arc::new(queue));
        }

        Ok(Self::with_state(config, AppState::new(Arc::new(relay))))
    }

    /// Create a server around existing state
    pub fn with_state(config: ServerConfig, app_state: AppState) -> Self {
        Self { config, app_state }
    }

    /// Get the configured router
    pub fn router(&self) -> Router {
        api_router(self.app_state.clone())
            // Body size limit
            .layer(body_limit_layer(self.config.max_body_size))
            // Timeout
            .layer(timeout_layer(self.config.timeout))
            // Tracing
            .layer(middleware::from_fn(tracing_middleware))
            // Request ID (outermost - runs first)
            .layer(middleware::from_fn(request_id_middleware))
    }

    /// Run the server with graceful shutdown
    pub async fn run(self) -> Result<(), ApiError> {
        let app = self.router();
        let addr = self.config.addr;

        let relay = self.app_state.relay();
        let periodic = match relay.queue() {
            Ok(queue) => queue
                .config()
                .sweep_interval
                .map(|interval| queue.spawn_periodic(interval)),
            Err(_) => None,
        };

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Turnrelay listening on http://{}", addr);

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ApiError::Internal(format!("Server error: {}", e)));

        if let Some(handle) = periodic {
            handle.abort();
        }
        served?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Shared state
    pub fn state(&self) -> &AppState {
        &self.app_state
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Initialize tracing subscriber
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,turnrelay_api=debug,turnrelay_queue=debug,tower_http=debug")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
