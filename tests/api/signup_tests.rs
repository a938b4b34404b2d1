//! Signup API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

use crate::common::{assert_error, body_json, signup_body, TestApp};
use social_server::domain::AUTH_COLLECTION;
use social_server::presentation::middleware::SESSION_COOKIE;
use social_server::shared::helpers::capitalize;

#[tokio::test]
async fn test_signup_creates_user() {
    let app = TestApp::new().await;
    let server = app.server();
    let body = signup_body();

    let response = server.post("/api/v1/signup").json(&body).await;

    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    assert_eq!(created["message"], "User created successfully");

    let auth = &created["authData"];
    let username = body["username"].as_str().unwrap();
    assert_eq!(auth["username"], capitalize(username).as_str());
    assert_eq!(
        auth["email"],
        body["email"].as_str().unwrap().to_lowercase().as_str()
    );
    assert_eq!(auth["avatarColor"], "#9c27b0");
    assert!(auth["_id"].is_string());
    assert!(auth.get("password").is_none());

    let u_id = auth["uId"].as_str().unwrap();
    assert_eq!(u_id.len(), 12);
    assert!(u_id.chars().all(|c| c.is_ascii_digit()));

    let stored = app.store.documents(AUTH_COLLECTION);
    assert_eq!(stored.len(), 1);
    let password = stored[0]["password"].as_str().unwrap();
    assert!(password.starts_with("$argon2"));
    assert_ne!(password, "s3cret");
}

#[tokio::test]
async fn test_signup_starts_a_session() {
    let app = TestApp::new().await;
    let server = app.server();

    let response = server.post("/api/v1/signup").json(&signup_body()).await;

    response.assert_status(StatusCode::CREATED);
    let cookie = response.cookie(SESSION_COOKIE);
    assert!(!cookie.value().is_empty());
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/"));
}

#[tokio::test]
async fn test_duplicate_username_is_rejected() {
    let app = TestApp::new().await;
    let server = app.server();
    let first = signup_body();
    server
        .post("/api/v1/signup")
        .json(&first)
        .await
        .assert_status(StatusCode::CREATED);

    let mut second = signup_body();
    // Usernames are stored capitalized, so both spellings collide
    second["username"] = json!(capitalize(first["username"].as_str().unwrap()));
    let response = server.post("/api/v1/signup").json(&second).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({
        "message": "User already exist",
        "status": "error",
        "statusCode": 400
    }));
    assert_eq!(app.store.documents(AUTH_COLLECTION).len(), 1);
}

#[tokio::test]
async fn test_duplicate_email_is_rejected_case_insensitively() {
    let app = TestApp::new().await;
    let first = signup_body();
    let response = app.post_json("/api/v1/signup", &first).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let mut second = signup_body();
    second["email"] = json!(first["email"].as_str().unwrap().to_uppercase());
    let response = app.post_json("/api/v1/signup", &second).await;

    assert_error(response, StatusCode::BAD_REQUEST, "User already exist").await;
}

#[tokio::test]
async fn test_concurrent_duplicate_is_rejected_by_the_store() {
    let app = TestApp::new().await;
    let first = signup_body();
    let response = app.post_json("/api/v1/signup", &first).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // The lookup misses the first user, as when both requests race
    app.store.set_stale_reads(true);
    let mut second = signup_body();
    second["email"] = first["email"].clone();
    let response = app.post_json("/api/v1/signup", &second).await;

    assert_error(response, StatusCode::BAD_REQUEST, "User already exist").await;
    assert_eq!(app.store.documents(AUTH_COLLECTION).len(), 1);
}

#[test_case("username", json!("abc"), "Invalid username" ; "short username")]
#[test_case("username", json!("abcdefghi"), "Invalid username" ; "long username")]
#[test_case("password", json!("abcdefghi"), "Invalid password" ; "long password")]
#[test_case("email", json!("not-an-email"), "Email must be valid" ; "invalid email")]
#[test_case("avatarColor", json!(""), "Avatar color is required" ; "empty avatar color")]
#[test_case("avatarImage", Value::Null, "Avatar image is required" ; "null avatar image")]
#[tokio::test]
async fn test_invalid_signup_is_rejected(field: &str, value: Value, message: &str) {
    let app = TestApp::new().await;
    let mut body = signup_body();
    body[field] = value;

    let response = app.post_json("/api/v1/signup", &body).await;

    assert_error(response, StatusCode::BAD_REQUEST, message).await;
    assert!(app.store.documents(AUTH_COLLECTION).is_empty());
}

#[tokio::test]
async fn test_validation_runs_before_the_store_is_touched() {
    let app = TestApp::new().await;
    // A store failure would answer 500; validation must answer first
    app.store.set_unavailable(true);

    let response = app
        .post_json("/api/v1/signup", &json!({ "username": "x" }))
        .await;

    assert_error(response, StatusCode::BAD_REQUEST, "Invalid username").await;
}

#[tokio::test]
async fn test_signup_accepts_url_encoded_bodies() {
    let app = TestApp::new().await;

    let response = app
        .post_form(
            "/api/v1/signup",
            "username=formuser&password=s3cret&email=form%40example.com\
             &avatarColor=blue&avatarImage=data%3Aimage%2Fpng",
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["authData"]["username"], "Formuser");
    assert_eq!(body["authData"]["email"], "form@example.com");
}
