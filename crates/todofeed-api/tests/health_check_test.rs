//! Health, readiness, and liveness endpoint tests.

use std::{sync::Arc, time::Duration};

use axum::{body::Body, http::Request, http::StatusCode, Router};
use serde_json::Value;
use todofeed_api::{create_router, sink::mock::MockTodoSink, AppState};
use todofeed_core::TestClock;
use tower::ServiceExt;

fn app(sink: &MockTodoSink) -> Router {
    let state = AppState::new(Arc::new(sink.clone()), Arc::new(TestClock::new()));
    create_router(state, Duration::from_secs(30))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.expect("failed to make request");
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    (status, serde_json::from_slice(&body_bytes).expect("response should be valid JSON"))
}

#[tokio::test]
async fn health_check_returns_success_when_sink_is_up() {
    let sink = MockTodoSink::new();

    let (status, body) = get(app(&sink), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"]["status"], "up");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn health_check_reports_unavailable_sink() {
    let sink = MockTodoSink::new();
    sink.fail_with("connection refused").await;

    let (status, body) = get(app(&sink), "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["database"]["status"], "down");
    assert!(body["checks"]["database"]["message"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn readiness_follows_sink_health() {
    let sink = MockTodoSink::new();
    let (status, _) = get(app(&sink), "/ready").await;
    assert_eq!(status, StatusCode::OK);

    sink.fail_with("pool closed").await;
    let (status, _) = get(app(&sink), "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn liveness_ignores_sink_health() {
    let sink = MockTodoSink::new();
    sink.fail_with("pool closed").await;

    let (status, body) = get(app(&sink), "/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
    assert_eq!(body["service"], "todofeed");
}
