//! HTTP delivery to the note-taking API
//!
//! One `POST /v1/pages` per event. Responses are classified into
//! [`DeliveryOutcome`]s; nothing is retried here.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::time::Instant;
use tracing::{info_span, Instrument};
use turnrelay_core::Event;

use crate::config::{ConfigError, Credentials, NotesConfig};
use crate::payload::PageRequest;
use crate::provider::{DeliveryFailure, DeliveryOutcome, DeliveryProvider};

/// Longest error body kept in a failure reason
const MAX_ERROR_BODY: usize = 1024;

/// Created page, as returned by the API
#[derive(Debug, Deserialize)]
struct CreatedPage {
    #[serde(default)]
    id: Option<String>,
}

/// Note-taking API provider
#[derive(Debug, Clone)]
pub struct NotionProvider {
    /// `None` when either secret is missing
    credentials: Option<Credentials>,
    /// HTTP client
    client: reqwest::Client,
    /// Base URL
    base_url: String,
    /// `Notion-Version` header value
    api_version: String,
}

impl NotionProvider {
    /// Create a provider from configuration.
    ///
    /// Missing credentials are not an error here; every attempt then
    /// resolves to [`DeliveryFailure::NotConfigured`] without a request.
    pub fn new(config: &NotesConfig) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("turnrelay/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;

        if let Err(e) = config.require_credentials() {
            tracing::warn!(error = %e, "Note API credentials not configured; deliveries will fail");
        }

        Ok(Self {
            credentials: config.credentials(),
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(&NotesConfig::from_env()?)
    }

    fn pages_url(&self) -> String {
        format!("{}/v1/pages", self.base_url)
    }

    async fn classify(response: Response) -> DeliveryOutcome {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after_secs(response.headers());
            tracing::warn!(?retry_after, "Note API rate limited the delivery");
            return DeliveryOutcome::RateLimited { retry_after };
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Note API rejected the delivery");
            return DeliveryOutcome::Failed(DeliveryFailure::Status {
                status: status.as_u16(),
                body: truncate(body, MAX_ERROR_BODY),
            });
        }

        match response.json::<CreatedPage>().await {
            Ok(page) => {
                tracing::info!(page_id = ?page.id, "Turn delivered");
                DeliveryOutcome::Delivered { id: page.id }
            }
            Err(e) => {
                // The record exists; only the echo is unreadable.
                tracing::warn!(error = %e, "Delivered but response body unreadable");
                DeliveryOutcome::Delivered { id: None }
            }
        }
    }
}

#[async_trait]
impl DeliveryProvider for NotionProvider {
    fn name(&self) -> &str {
        "notion"
    }

    async fn deliver(&self, event: &Event) -> DeliveryOutcome {
        let Some(credentials) = self.credentials.as_ref() else {
            tracing::error!("Delivery skipped: credentials not configured");
            return DeliveryOutcome::Failed(DeliveryFailure::NotConfigured);
        };

        let request = PageRequest::from_event(event, &credentials.database_id, Utc::now());
        let span = info_span!("turn_delivery", title = %request.title());

        async move {
            let start = Instant::now();

            let response = match self
                .client
                .post(self.pages_url())
                .bearer_auth(&credentials.token)
                .header("Notion-Version", &self.api_version)
                .json(&request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        duration_ms = start.elapsed().as_millis() as u64,
                        error = %e,
                        "Delivery request failed"
                    );
                    return DeliveryOutcome::Failed(DeliveryFailure::Transport(e.to_string()));
                }
            };

            tracing::debug!(
                status = response.status().as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Received response"
            );

            Self::classify(response).await
        }
        .instrument(span)
        .await
    }
}

/// Parse a `Retry-After` header as delta-seconds or an HTTP date.
///
/// Dates in the past yield `Some(0)`; unparsable values yield `None`.
pub fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(seconds);
    }

    if let Ok(seconds) = raw.parse::<f64>() {
        if seconds.is_finite() && seconds >= 0.0 {
            return Some(seconds.ceil() as u64);
        }
    }

    let date = chrono::DateTime::parse_from_rfc2822(raw).ok()?;
    let delta = date.with_timezone(&Utc).signed_duration_since(Utc::now());
    Some(delta.num_seconds().max(0) as u64)
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() <= max {
        return body;
    }
    let mut cut = max;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body.truncate(cut);
    body.push_str("... (truncated)");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("120"));
        assert_eq!(retry_after_secs(&headers), Some(120));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("0.4"));
        assert_eq!(retry_after_secs(&headers), Some(1));
    }

    #[test]
    fn test_retry_after_missing_or_invalid() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after_secs(&headers), None);
    }

    #[test]
    fn test_retry_after_http_date() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        // already in the past
        assert_eq!(retry_after_secs(&headers), Some(0));

        let future = (Utc::now() + chrono::Duration::seconds(300)).to_rfc2822();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(&future).unwrap());
        let secs = retry_after_secs(&headers).unwrap();
        assert!((295..=300).contains(&secs), "got {secs}");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "ü".repeat(MAX_ERROR_BODY);
        let truncated = truncate(body, MAX_ERROR_BODY);
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.len() <= MAX_ERROR_BODY + "... (truncated)".len());

        assert_eq!(truncate("short".to_string(), MAX_ERROR_BODY), "short");
    }
}
