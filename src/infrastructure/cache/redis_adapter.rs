//! Redis fan-out adapter.
//!
//! Packets are JSON-encoded and exchanged over a single pub/sub channel.
//! Publishing and subscribing use separate connections because a Redis
//! connection in subscriber mode cannot issue other commands.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use redis::aio::{ConnectionManager, PubSub};
use redis::AsyncCommands;
use tracing::{info, instrument, warn};

use super::connection::{BackplaneConnection, BackplaneError};
use crate::domain::{Adapter, BroadcastPacket, RealtimeError};

/// Pub/sub channel shared by every process of the deployment
pub const CHANNEL: &str = "realtime#/#";

pub struct RedisAdapter {
    publisher: ConnectionManager,
    subscriber: Mutex<Option<PubSub>>,
}

impl RedisAdapter {
    /// Bring both connections up concurrently; either failure aborts.
    #[instrument(skip_all, fields(publisher = %publisher.name(), subscriber = %subscriber.name()))]
    pub async fn connect(
        publisher: &BackplaneConnection,
        subscriber: &BackplaneConnection,
    ) -> Result<Self, RealtimeError> {
        let (manager, pubsub) =
            tokio::try_join!(publisher.try_connect(), subscriber.open_pubsub())?;

        info!(channel = CHANNEL, "Realtime adapter connected");
        Ok(Self {
            publisher: manager,
            subscriber: Mutex::new(Some(pubsub)),
        })
    }
}

fn decode(payload: &[u8]) -> Option<BroadcastPacket> {
    match serde_json::from_slice(payload) {
        Ok(packet) => Some(packet),
        Err(err) => {
            warn!(error = %err, "Dropping malformed backplane packet");
            None
        }
    }
}

#[async_trait]
impl Adapter for RedisAdapter {
    async fn publish(&self, packet: &BroadcastPacket) -> Result<(), RealtimeError> {
        let payload = serde_json::to_vec(packet)?;
        let mut conn = self.publisher.clone();
        conn.publish::<_, _, ()>(CHANNEL, payload)
            .await
            .map_err(BackplaneError::from)?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, BroadcastPacket>, RealtimeError> {
        let mut pubsub = self
            .subscriber
            .lock()
            .take()
            .ok_or(RealtimeError::AlreadySubscribed)?;

        pubsub.subscribe(CHANNEL).await.map_err(BackplaneError::from)?;
        info!(channel = CHANNEL, "Subscribed to backplane channel");

        Ok(pubsub
            .into_on_message()
            .filter_map(|msg| async move { decode(msg.get_payload_bytes()) })
            .boxed())
    }
}
