//! API routes

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use turnrelay_core::Event;
use turnrelay_persist::StorageBackend;
use turnrelay_queue::{MetricsSnapshot, SubmitOutcome, SweepReport};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentHealth>,
}

/// Component health status
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub storage: ComponentStatus,
    pub queue: ComponentStatus,
}

/// Individual component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
}

impl ComponentStatus {
    fn unavailable() -> Self {
        Self {
            status: "unavailable".to_string(),
            latency_ms: None,
            depth: None,
        }
    }
}

/// Basic health check handler (lightweight)
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        components: None,
    })
}

/// Detailed health check with storage connectivity and queue depth
pub async fn health_detailed(State(state): State<AppState>) -> Json<HealthResponse> {
    let relay = state.relay();

    let (storage, queue) = match relay.queue() {
        Ok(queue) => {
            let start = std::time::Instant::now();
            let healthy = queue.store().is_healthy().await;
            let latency = start.elapsed().as_millis() as u64;
            let depth = queue.depth().await.ok();

            (
                ComponentStatus {
                    status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
                    latency_ms: Some(latency),
                    depth: None,
                },
                ComponentStatus {
                    status: if depth.is_some() { "healthy" } else { "unhealthy" }.to_string(),
                    latency_ms: None,
                    depth,
                },
            )
        }
        Err(_) => (ComponentStatus::unavailable(), ComponentStatus::unavailable()),
    };

    let overall = if storage.status == "healthy" && queue.status == "healthy" {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: overall.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        components: Some(ComponentHealth { storage, queue }),
    })
}

/// Answer to an accepted turn
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    /// `delivered` or `queued`
    pub status: String,
    /// Created record id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Queue key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Parse an inbound body into an [`Event`]; only JSON objects are accepted
pub fn parse_turn(body: &[u8]) -> ApiResult<Event> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;

    if !value.is_object() {
        return Err(ApiError::BadRequest(
            "Turn payload must be a JSON object".to_string(),
        ));
    }

    let event: Event = serde_json::from_value(value)
        .map_err(|e| ApiError::BadRequest(format!("Invalid turn payload: {}", e)))?;
    Ok(event.normalized())
}

/// Relay one resolved turn
pub async fn submit_turn(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<TurnResponse>)> {
    let event = parse_turn(&body)?;

    match state.relay().submit(event).await {
        SubmitOutcome::Delivered { id } => Ok((
            StatusCode::CREATED,
            Json(TurnResponse {
                status: "delivered".to_string(),
                id,
                key: None,
            }),
        )),
        SubmitOutcome::Queued { key } => Ok((
            StatusCode::ACCEPTED,
            Json(TurnResponse {
                status: "queued".to_string(),
                id: None,
                key: Some(key),
            }),
        )),
        SubmitOutcome::RateLimited { retry_after } => Err(ApiError::RateLimited { retry_after }),
        SubmitOutcome::Failed(failure) if failure.is_configuration() => {
            Err(ApiError::Configuration(failure.to_string()))
        }
        SubmitOutcome::Failed(failure) => Err(ApiError::DeliveryFailed(failure.to_string())),
    }
}

/// One queued item, as shown to operators
#[derive(Debug, Serialize)]
pub struct QueuedItemView {
    pub key: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueueListResponse {
    pub backend: String,
    pub depth: usize,
    pub items: Vec<QueuedItemView>,
}

/// List queued items
pub async fn list_queue(State(state): State<AppState>) -> ApiResult<Json<QueueListResponse>> {
    let relay = state.relay();
    let queue = relay.queue()?;

    let items: Vec<QueuedItemView> = queue
        .store()
        .load_all()
        .await?
        .into_iter()
        .map(|(key, item)| QueuedItemView {
            key,
            name: item.event.name,
            status: item.event.status,
            retry_count: item.retry_count,
            enqueued_at: item.enqueued_at,
            last_attempt_at: item.last_attempt_at,
            last_error: item.last_error,
        })
        .collect();

    Ok(Json(QueueListResponse {
        backend: queue.store().backend().name().to_string(),
        depth: items.len(),
        items,
    }))
}

/// Run one sweep now and report it
pub async fn trigger_sweep(State(state): State<AppState>) -> ApiResult<Json<SweepReport>> {
    let relay = state.relay();
    let queue = relay.queue()?;
    Ok(Json(queue.sweep().await))
}

/// Metrics as JSON
pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics().snapshot())
}

/// Metrics in Prometheus text format
pub async fn get_prometheus_metrics(State(state): State<AppState>) -> String {
    state.metrics().snapshot().to_prometheus()
}

/// Build API router
pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Public endpoints
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed))
        // Inbound turns
        .route("/api/v1/turns", post(submit_turn))
        // Operator endpoints
        .route("/api/v1/queue", get(list_queue))
        .route("/api/v1/queue/sweep", post(trigger_sweep))
        .route("/api/v1/metrics", get(get_metrics))
        .route("/metrics", get(get_prometheus_metrics))
        .with_state(state)
}
