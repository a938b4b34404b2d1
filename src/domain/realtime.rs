//! Cross-process fan-out contract.
//!
//! Every process publishes the events it emits as [`BroadcastPacket`]s and
//! replays the packets published by its peers to its own sockets.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One emitted event as it travels over the backplane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastPacket {
    /// Node id of the publishing process
    pub origin: Uuid,

    /// Target rooms; empty means every socket
    #[serde(default)]
    pub rooms: Vec<String>,

    /// Socket id that must not receive the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub except: Option<String>,

    pub event: String,

    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("backplane failure: {0}")]
    Backplane(String),

    #[error("malformed packet: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("adapter is already subscribed")]
    AlreadySubscribed,
}

/// Publish/subscribe pair shared by all processes of a deployment
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Hand a packet to every subscribed process, this one included
    async fn publish(&self, packet: &BroadcastPacket) -> Result<(), RealtimeError>;

    /// Stream of packets published by any process. May be taken once.
    async fn subscribe(&self) -> Result<BoxStream<'static, BroadcastPacket>, RealtimeError>;
}
