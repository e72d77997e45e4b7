//! HTTP classification tests for the note API provider

use serde_json::{json, Value};
use turnrelay_core::Event;
use turnrelay_delivery::{
    DeliveryFailure, DeliveryOutcome, DeliveryProvider, NotesConfig, NotionProvider,
};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer) -> NotionProvider {
    let config = NotesConfig::new("secret-token", "db-42").with_api_url(&server.uri());
    NotionProvider::new(&config).unwrap()
}

#[tokio::test]
async fn delivered_on_success_with_page_id() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/pages"))
        .and(matchers::header("authorization", "Bearer secret-token"))
        .and(matchers::header("Notion-Version", "2022-06-28"))
        .and(matchers::body_partial_json(json!({
            "parent": { "database_id": "db-42" },
            "properties": {
                "Name": { "title": [{ "text": { "content": "Turn 9" } }] },
                "Status": { "select": { "name": "Draw" } }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "page-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = provider_for(&server)
        .deliver(&Event::named("Turn 9").with_status("Draw"))
        .await;

    assert_eq!(
        outcome,
        DeliveryOutcome::Delivered {
            id: Some("page-1".to_string())
        }
    );
}

#[tokio::test]
async fn delivery_timestamp_is_attempt_time() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "page-2" })))
        .mount(&server)
        .await;

    let before = chrono::Utc::now() - chrono::Duration::seconds(1);
    provider_for(&server).deliver(&Event::default()).await;
    let after = chrono::Utc::now() + chrono::Duration::seconds(1);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = requests[0].body_json().unwrap();

    let start = body["properties"]["Delivered At"]["date"]["start"]
        .as_str()
        .unwrap();
    let stamped = chrono::DateTime::parse_from_rfc3339(start)
        .unwrap()
        .with_timezone(&chrono::Utc);
    assert!(stamped >= before && stamped <= after);

    let title = body["properties"]["Name"]["title"][0]["text"]["content"]
        .as_str()
        .unwrap();
    assert!(title.starts_with("Turn resolved "));
}

#[tokio::test]
async fn success_without_id_still_delivered() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .mount(&server)
        .await;

    let outcome = provider_for(&server).deliver(&Event::named("Turn 3")).await;
    assert_eq!(outcome, DeliveryOutcome::Delivered { id: None });
}

#[tokio::test]
async fn rate_limited_with_retry_after() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_string("slow down")
                .append_header("Retry-After", "30"),
        )
        .mount(&server)
        .await;

    let outcome = provider_for(&server).deliver(&Event::named("Turn 4")).await;
    assert_eq!(
        outcome,
        DeliveryOutcome::RateLimited {
            retry_after: Some(30)
        }
    );
}

#[tokio::test]
async fn rate_limited_without_hint() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let outcome = provider_for(&server).deliver(&Event::named("Turn 4")).await;
    assert_eq!(outcome, DeliveryOutcome::RateLimited { retry_after: None });
}

#[tokio::test]
async fn non_success_status_fails_with_code() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("validation_error"))
        .mount(&server)
        .await;

    let outcome = provider_for(&server).deliver(&Event::named("Turn 5")).await;

    match outcome {
        DeliveryOutcome::Failed(failure) => {
            assert_eq!(
                failure,
                DeliveryFailure::Status {
                    status: 400,
                    body: "validation_error".to_string()
                }
            );
            assert!(failure.to_string().contains("400"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_fails() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let outcome = provider_for(&server).deliver(&Event::named("Turn 6")).await;
    assert!(matches!(
        outcome,
        DeliveryOutcome::Failed(DeliveryFailure::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn missing_credentials_never_call_out() {
    let server = MockServer::start().await;

    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = NotesConfig::new("secret-token", "db-42").with_api_url(&server.uri());
    config.database_id = None;
    let provider = NotionProvider::new(&config).unwrap();

    let outcome = provider.deliver(&Event::named("Turn 1")).await;
    assert_eq!(outcome, DeliveryOutcome::Failed(DeliveryFailure::NotConfigured));
    assert_eq!(outcome_reason(&outcome), "credentials not configured");

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn transport_error_fails_with_message() {
    // Nothing listens on port 1
    let config = NotesConfig::new("secret-token", "db-42").with_api_url("http://127.0.0.1:1");
    let provider = NotionProvider::new(&config).unwrap();

    let outcome = provider.deliver(&Event::named("Turn 1")).await;
    match outcome {
        DeliveryOutcome::Failed(DeliveryFailure::Transport(message)) => {
            assert!(!message.is_empty());
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
}

fn outcome_reason(outcome: &DeliveryOutcome) -> String {
    match outcome {
        DeliveryOutcome::Failed(failure) => failure.to_string(),
        other => other.label().to_string(),
    }
}
