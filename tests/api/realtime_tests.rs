//! Realtime Fan-out Tests
//!
//! Two applications attached to one backplane stand in for two server
//! processes sharing a Redis channel.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_test::assert_ok;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use crate::common::{body_json, test_settings, test_state, InMemoryStore};
use social_server::infrastructure::cache::MemoryBackplane;
use social_server::presentation::websocket::handler::handle_frame;
use social_server::presentation::websocket::EventFrame;
use social_server::startup::build_router;

async fn next_frame(rx: &mut mpsc::UnboundedReceiver<EventFrame>) -> Option<EventFrame> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn test_room_broadcast_reaches_other_process() {
    let backplane = MemoryBackplane::new();
    let first = test_state(test_settings(), Arc::new(InMemoryStore::new()), &backplane).await;
    let second = test_state(test_settings(), Arc::new(InMemoryStore::new()), &backplane).await;

    let (alice_tx, mut alice) = mpsc::unbounded_channel();
    let (bob_tx, mut bob) = mpsc::unbounded_channel();
    first.events.register_socket("alice".into(), alice_tx);
    second.events.register_socket("bob".into(), bob_tx);

    assert_ok!(handle_frame(r#"{"type":"join","room":"lobby"}"#, "alice", &first.events).await);
    assert_ok!(handle_frame(r#"{"type":"join","room":"lobby"}"#, "bob", &second.events).await);

    assert_ok!(
        handle_frame(
            r#"{"type":"emit","event":"post","data":{"id":1},"room":"lobby"}"#,
            "alice",
            &first.events,
        )
        .await
    );

    assert_eq!(
        next_frame(&mut bob).await,
        Some(EventFrame::new("post", json!({ "id": 1 })))
    );
    // The sender never hears its own broadcast
    assert_eq!(next_frame(&mut alice).await, None);
}

#[tokio::test]
async fn test_server_emit_reaches_every_process_once() {
    let backplane = MemoryBackplane::new();
    let first = test_state(test_settings(), Arc::new(InMemoryStore::new()), &backplane).await;
    let second = test_state(test_settings(), Arc::new(InMemoryStore::new()), &backplane).await;

    let (local_tx, mut local) = mpsc::unbounded_channel();
    let (remote_tx, mut remote) = mpsc::unbounded_channel();
    first.events.register_socket("local".into(), local_tx);
    second.events.register_socket("remote".into(), remote_tx);

    let delivered = assert_ok!(first.events.emit("notice", json!("hi")).await);
    assert_eq!(delivered, 1);

    let expected = Some(EventFrame::new("notice", json!("hi")));
    assert_eq!(next_frame(&mut local).await, expected);
    assert_eq!(next_frame(&mut remote).await, expected);
    // The relay skips packets this process published itself
    assert_eq!(next_frame(&mut local).await, None);
}

#[tokio::test]
async fn test_left_room_stops_delivery() {
    let backplane = MemoryBackplane::new();
    let first = test_state(test_settings(), Arc::new(InMemoryStore::new()), &backplane).await;
    let second = test_state(test_settings(), Arc::new(InMemoryStore::new()), &backplane).await;

    let (bob_tx, mut bob) = mpsc::unbounded_channel();
    second.events.register_socket("bob".into(), bob_tx);
    assert_ok!(handle_frame(r#"{"type":"join","room":"news"}"#, "bob", &second.events).await);
    assert_ok!(handle_frame(r#"{"type":"leave","room":"news"}"#, "bob", &second.events).await);
    assert_eq!(second.events.room_size("news"), 0);

    assert_ok!(first.events.emit_to("news", "headline", json!({})).await);

    assert_eq!(next_frame(&mut bob).await, None);
}

#[tokio::test]
async fn test_lost_subscription_is_reported_not_silent() {
    let backplane = MemoryBackplane::new();
    let first = test_state(test_settings(), Arc::new(InMemoryStore::new()), &backplane).await;
    let second = test_state(test_settings(), Arc::new(InMemoryStore::new()), &backplane).await;
    second.readiness.mark_ready();
    assert!(second.events.relay_alive());

    let (bob_tx, mut bob) = mpsc::unbounded_channel();
    second.events.register_socket("bob".into(), bob_tx);

    backplane.disconnect_subscribers();
    tokio::time::timeout(Duration::from_secs(1), second.events.relay_stopped())
        .await
        .expect("relay should report that it stopped");

    // Publishing still succeeds, but the remote socket hears nothing
    assert_ok!(first.events.emit("notice", json!("hi")).await);
    assert_eq!(next_frame(&mut bob).await, None);

    let router = build_router(second.clone()).unwrap();
    let response = router
        .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["checks"]["realtime"]["status"], "unhealthy");
    assert_eq!(body["checks"]["realtime"]["relay_alive"], false);
}
