//! WebSocket Connection Handler
//!
//! Upgrades `GET /realtime`, registers the socket with the [`EventServer`]
//! and translates client frames into joins, leaves and broadcasts.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::gateway::EventServer;
use super::messages::{ClientFrame, EventFrame};
use crate::config::CorsSettings;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    check_origin(&headers, &state.settings.cors)?;

    let events = state.events.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, events)))
}

/// Browsers do not apply CORS to upgrades, so the origin is checked here.
/// Non-browser clients send no `Origin` and are let through.
pub fn check_origin(headers: &HeaderMap, cors: &CorsSettings) -> Result<(), AppError> {
    match headers.get(header::ORIGIN) {
        None => Ok(()),
        Some(origin) if origin.as_bytes() == cors.client_url.trim_end_matches('/').as_bytes() => {
            Ok(())
        }
        Some(origin) => {
            tracing::debug!(origin = ?origin, "Rejected realtime upgrade from foreign origin");
            Err(AppError::Unauthorized("Origin not allowed".into()))
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, events: Arc<EventServer>) {
    let sid = Uuid::new_v4().simple().to_string();

    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();

    // Create channel for outgoing frames
    let (tx, mut rx) = mpsc::unbounded_channel::<EventFrame>();

    if tx.send(EventFrame::connect(&sid)).is_err() {
        return;
    }
    events.register_socket(sid.clone(), tx);
    tracing::info!(sid = %sid, sockets = events.socket_count(), "Socket connected");

    // Spawn task to forward frames from channel to WebSocket
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!("Failed to serialize frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_frame(&text, &sid, &events).await {
                    tracing::debug!(sid = %sid, error = %e, "Error handling frame");
                }
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(sid = %sid, "Connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(sid = %sid, error = %e, "WebSocket error");
                break;
            }
            // Pong is handled automatically by axum
            _ => {}
        }
    }

    // Cleanup
    events.unregister_socket(&sid);
    sender_task.abort();
    tracing::info!(sid = %sid, "Socket disconnected");
}

/// Apply one client frame
pub async fn handle_frame(
    text: &str,
    sid: &str,
    events: &EventServer,
) -> Result<(), anyhow::Error> {
    match serde_json::from_str::<ClientFrame>(text)? {
        ClientFrame::Join { room } => events.join(sid, &room),
        ClientFrame::Leave { room } => events.leave(sid, &room),
        ClientFrame::Emit { event, data, room } => {
            events
                .broadcast_from(sid, room.as_deref(), &event, data)
                .await?;
        }
    }
    Ok(())
}
