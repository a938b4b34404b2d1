//! Middleware Pipeline Tests
//!
//! Ordering and behavior of the security, parsing and terminal stages.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode, Uri},
    routing::get,
    Router,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{assert_error, body_json, test_settings, TestApp, CLIENT_URL};
use social_server::domain::AUTH_COLLECTION;
use social_server::startup::AppServer;

#[tokio::test]
async fn test_unmatched_path_returns_not_found() {
    let app = TestApp::new().await;

    let response = app.get("/does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "/does-not-exist not found." })
    );
}

#[tokio::test]
async fn test_unmatched_post_returns_not_found() {
    let app = TestApp::new().await;

    let response = app.post_json("/api/v1/unknown", &json!({})).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "/api/v1/unknown not found." })
    );
}

#[tokio::test]
async fn test_greeting() {
    let app = TestApp::new().await;

    let response = app.get("/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "message": "hello world" }));
}

#[tokio::test]
async fn test_hardening_headers_on_every_response() {
    let app = TestApp::new().await;

    for uri in ["/", "/does-not-exist"] {
        let response = app.get(uri).await;
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
        assert!(headers.contains_key("content-security-policy"));
        // Development deployments do not pin HTTPS
        assert!(!headers.contains_key("strict-transport-security"));
    }
}

#[tokio::test]
async fn test_production_sends_hsts() {
    let mut settings = test_settings();
    settings.environment = "production".into();
    let app = TestApp::with_settings(settings).await;

    let response = app.get("/").await;

    assert!(response
        .headers()
        .contains_key("strict-transport-security"));
}

#[tokio::test]
async fn test_cors_preflight_from_trusted_origin() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/v1/signup")
                .header(header::ORIGIN, CLIENT_URL)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], CLIENT_URL);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    for method in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
        assert!(methods.contains(method), "{methods}");
    }
}

#[tokio::test]
async fn test_cors_ignores_foreign_origin() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::builder()
                .uri("/")
                .header(header::ORIGIN, "http://evil.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_large_responses_are_compressed() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::builder()
                .uri("/a-rather-long-path-that-nothing-answers")
                .header(header::ACCEPT_ENCODING, "gzip")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
}

#[tokio::test]
async fn test_oversized_body_is_rejected_before_the_handler() {
    let mut settings = test_settings();
    settings.http.body_limit_bytes = 1024;
    let app = TestApp::with_settings(settings).await;

    let body = json!({
        "username": "alice",
        "password": "s3cret",
        "email": "alice@example.com",
        "avatarColor": "red",
        "avatarImage": "x".repeat(4096)
    });
    let response = app.post_json("/api/v1/signup", &body).await;

    assert_error(
        response,
        StatusCode::PAYLOAD_TOO_LARGE,
        "Request body exceeds the size limit",
    )
    .await;
    assert!(app.store.documents(AUTH_COLLECTION).is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new().await;

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/signup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"username\":"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["statusCode"], 400);
}

#[tokio::test]
async fn test_unrecognized_errors_get_a_bare_500() {
    let app = TestApp::new().await;
    app.store.set_unavailable(true);

    let response = app
        .post_json("/api/v1/signup", &crate::common::signup_body())
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.is_empty());
}

fn echo_routes() -> Router<social_server::startup::AppState> {
    async fn echo_query(uri: Uri) -> String {
        uri.query().unwrap_or_default().to_owned()
    }

    async fn explode() -> &'static str {
        panic!("handler exploded")
    }

    Router::new()
        .route("/echo", get(echo_query))
        .route("/explode", get(explode))
}

async fn echo_app() -> (TestApp, Router) {
    let app = TestApp::new().await;
    let router = AppServer::new(app.state.clone())
        .security_middleware()
        .unwrap()
        .standard_middleware()
        .route_middleware(echo_routes())
        .global_handler()
        .into_router();
    (app, router)
}

#[tokio::test]
async fn test_repeated_query_keys_keep_the_last_value() {
    use tower::ServiceExt;
    let (_app, router) = echo_app().await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/echo?sort=asc&page=1&sort=desc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"page=1&sort=desc");
}

#[tokio::test]
async fn test_panicking_handler_gets_a_bare_500_with_headers() {
    use tower::ServiceExt;
    let (_app, router) = echo_app().await;

    let response = router
        .oneshot(Request::builder().uri("/explode").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}
