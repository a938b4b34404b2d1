//! WebSocket Message Types
//!
//! Text frames carry JSON in both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name of the first frame every socket receives
pub const CONNECT_EVENT: &str = "connect";

/// Incoming client frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start receiving events sent to `room`
    Join { room: String },
    /// Stop receiving events sent to `room`
    Leave { room: String },
    /// Broadcast an event to every other socket, or to one room
    Emit {
        event: String,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        room: Option<String>,
    },
}

/// Outgoing event frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    pub data: Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Handshake frame carrying the socket id
    pub fn connect(sid: &str) -> Self {
        Self::new(CONNECT_EVENT, serde_json::json!({ "sid": sid }))
    }
}
