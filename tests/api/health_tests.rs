//! Health Check API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{body_json, test_settings, TestApp};

/// Liveness never depends on startup or dependencies
#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::unready(test_settings()).await;
    app.store.set_unavailable(true);

    let response = app.get("/health/live").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "alive" }));
}

#[tokio::test]
async fn test_readiness_before_startup_completes() {
    let app = TestApp::unready(test_settings()).await;

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_readiness_once_ready() {
    let app = TestApp::unready(test_settings()).await;
    app.state.readiness.mark_ready();

    let response = app.get("/health/ready").await;

    // The shared cache connection was never established, which only degrades
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["database"]["status"], "healthy");
    assert_eq!(body["checks"]["redis"]["status"], "unhealthy");
    assert_eq!(body["checks"]["realtime"]["status"], "healthy");
    assert_eq!(body["checks"]["realtime"]["relay_alive"], true);
    assert_eq!(body["checks"]["realtime"]["active_connections"], 0);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_readiness_fails_without_the_store() {
    let app = TestApp::new().await;
    app.store.set_unavailable(true);

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["status"], "unhealthy");
    assert!(body["checks"]["database"]["message"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}
