//! In-process fan-out backplane.
//!
//! Several [`EventServer`](crate::presentation::websocket::EventServer)s
//! attached to one [`MemoryBackplane`] behave like separate processes
//! sharing a Redis channel.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{broadcast, watch};
use tracing::warn;

use crate::domain::{Adapter, BroadcastPacket, RealtimeError};

const CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct MemoryBackplane {
    sender: broadcast::Sender<BroadcastPacket>,
    disconnected: watch::Sender<bool>,
}

impl MemoryBackplane {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CAPACITY);
        let (disconnected, _) = watch::channel(false);
        Self {
            sender,
            disconnected,
        }
    }

    /// Adapter for one simulated process
    pub fn adapter(&self) -> MemoryAdapter {
        MemoryAdapter {
            sender: self.sender.clone(),
            disconnected: self.disconnected.subscribe(),
        }
    }

    /// End every subscription while publishing keeps working, like a
    /// dropped subscriber socket
    pub fn disconnect_subscribers(&self) {
        self.disconnected.send_replace(true);
    }
}

impl Default for MemoryBackplane {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryAdapter {
    sender: broadcast::Sender<BroadcastPacket>,
    disconnected: watch::Receiver<bool>,
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn publish(&self, packet: &BroadcastPacket) -> Result<(), RealtimeError> {
        // No subscribers yet is not an error for a pub/sub channel
        let _ = self.sender.send(packet.clone());
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, BroadcastPacket>, RealtimeError> {
        let receiver = self.sender.subscribe();
        let mut disconnected = self.disconnected.clone();
        let ended = async move {
            if disconnected.wait_for(|d| *d).await.is_err() {
                // Backplane handle dropped; adapters keep the channel open
                std::future::pending::<()>().await;
            }
        };

        Ok(stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(packet) => return Some((packet, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Memory backplane subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .take_until(ended)
        .boxed())
    }
}
