//! Event Server
//!
//! Tracks the sockets connected to this process and the rooms they joined,
//! and fans every emitted event out through an [`Adapter`] so sockets held
//! by other processes receive it too.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::messages::EventFrame;
use crate::domain::{Adapter, BroadcastPacket, RealtimeError};

/// Connected socket with message sender
pub struct ConnectedSocket {
    pub sid: String,
    pub sender: mpsc::UnboundedSender<EventFrame>,
    rooms: Mutex<HashSet<String>>,
}

/// Realtime event server for one process
pub struct EventServer {
    /// Identifies packets published by this process
    node_id: Uuid,
    /// Active sockets by sid
    sockets: DashMap<String, Arc<ConnectedSocket>>,
    /// Room name to sids (for efficient room broadcasts)
    rooms: DashMap<String, Vec<String>>,
    adapter: Arc<dyn Adapter>,
    relay: Mutex<Option<JoinHandle<()>>>,
    /// `true` while remote packets are being replayed
    relay_alive: watch::Receiver<bool>,
}

impl EventServer {
    /// Subscribe to `adapter` and start relaying remote packets.
    ///
    /// The server is returned only once its subscription is live.
    pub async fn with_adapter(adapter: Arc<dyn Adapter>) -> Result<Arc<Self>, RealtimeError> {
        let packets = adapter.subscribe().await?;
        let (alive_tx, relay_alive) = watch::channel(true);

        let server = Arc::new(Self {
            node_id: Uuid::new_v4(),
            sockets: DashMap::new(),
            rooms: DashMap::new(),
            adapter,
            relay: Mutex::new(None),
            relay_alive,
        });

        let handle = tokio::spawn(relay(Arc::downgrade(&server), packets, alive_tx));
        *server.relay.lock() = Some(handle);

        info!(node_id = %server.node_id, "Event server attached to backplane");
        Ok(server)
    }

    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    /// Register a new connected socket
    pub fn register_socket(&self, sid: String, sender: mpsc::UnboundedSender<EventFrame>) {
        let socket = Arc::new(ConnectedSocket {
            sid: sid.clone(),
            sender,
            rooms: Mutex::new(HashSet::new()),
        });
        self.sockets.insert(sid.clone(), socket);

        debug!(sid = %sid, "Socket registered");
    }

    /// Unregister a socket and drop it from every room it joined
    pub fn unregister_socket(&self, sid: &str) {
        if let Some((_, socket)) = self.sockets.remove(sid) {
            let rooms: Vec<String> = socket.rooms.lock().drain().collect();
            for room in rooms {
                self.remove_from_room(&room, sid);
            }

            debug!(sid = %sid, "Socket unregistered");
        }
    }

    /// Add a socket to a room. Unknown sids are ignored.
    pub fn join(&self, sid: &str, room: &str) {
        let Some(socket) = self.sockets.get(sid).map(|s| Arc::clone(s.value())) else {
            return;
        };
        if socket.rooms.lock().insert(room.to_owned()) {
            self.rooms
                .entry(room.to_owned())
                .or_default()
                .push(sid.to_owned());
        }
    }

    /// Remove a socket from a room
    pub fn leave(&self, sid: &str, room: &str) {
        if let Some(socket) = self.sockets.get(sid) {
            socket.rooms.lock().remove(room);
        }
        self.remove_from_room(room, sid);
    }

    fn remove_from_room(&self, room: &str, sid: &str) {
        if let Some(mut sids) = self.rooms.get_mut(room) {
            sids.retain(|s| s != sid);
        }
        self.rooms.remove_if(room, |_, sids| sids.is_empty());
    }

    /// Send to every socket of every process
    pub async fn emit(&self, event: &str, data: Value) -> Result<usize, RealtimeError> {
        self.publish(self.packet(Vec::new(), None, event, data)).await
    }

    /// Send to every socket in `room`, on every process
    pub async fn emit_to(&self, room: &str, event: &str, data: Value) -> Result<usize, RealtimeError> {
        self.publish(self.packet(vec![room.to_owned()], None, event, data))
            .await
    }

    /// Send to everyone (or everyone in `room`) except the socket `sid`
    pub async fn broadcast_from(
        &self,
        sid: &str,
        room: Option<&str>,
        event: &str,
        data: Value,
    ) -> Result<usize, RealtimeError> {
        let rooms = room.map(|r| vec![r.to_owned()]).unwrap_or_default();
        self.publish(self.packet(rooms, Some(sid.to_owned()), event, data))
            .await
    }

    fn packet(
        &self,
        rooms: Vec<String>,
        except: Option<String>,
        event: &str,
        data: Value,
    ) -> BroadcastPacket {
        BroadcastPacket {
            origin: self.node_id,
            rooms,
            except,
            event: event.to_owned(),
            data,
        }
    }

    /// Deliver locally, then hand the packet to the other processes.
    /// Returns the number of local sockets reached.
    async fn publish(&self, packet: BroadcastPacket) -> Result<usize, RealtimeError> {
        let delivered = self.deliver_local(&packet);
        self.adapter.publish(&packet).await?;
        Ok(delivered)
    }

    /// Send a packet to the matching sockets of this process
    pub fn deliver_local(&self, packet: &BroadcastPacket) -> usize {
        let targets: Vec<String> = if packet.rooms.is_empty() {
            self.sockets.iter().map(|s| s.key().clone()).collect()
        } else {
            let mut unique = HashSet::new();
            for room in &packet.rooms {
                if let Some(sids) = self.rooms.get(room) {
                    unique.extend(sids.value().iter().cloned());
                }
            }
            unique.into_iter().collect()
        };

        let frame = EventFrame::new(packet.event.clone(), packet.data.clone());
        let mut delivered = 0;
        for sid in targets {
            if packet.except.as_deref() == Some(sid.as_str()) {
                continue;
            }
            if let Some(socket) = self.sockets.get(&sid) {
                if socket.sender.send(frame.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Whether packets from other processes still reach this one
    pub fn relay_alive(&self) -> bool {
        *self.relay_alive.borrow()
    }

    /// Resolve once the relay has stopped and remote events are lost
    pub async fn relay_stopped(&self) {
        let mut alive = self.relay_alive.clone();
        // A dropped sender means the relay task is gone as well
        let _ = alive.wait_for(|alive| !*alive).await;
    }

    /// Get socket count
    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    /// Number of local sockets in a room
    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|sids| sids.len()).unwrap_or(0)
    }
}

impl Drop for EventServer {
    fn drop(&mut self) {
        if let Some(handle) = self.relay.lock().take() {
            handle.abort();
        }
    }
}

/// Replay packets from other processes to local sockets
async fn relay(
    server: Weak<EventServer>,
    mut packets: BoxStream<'static, BroadcastPacket>,
    alive: watch::Sender<bool>,
) {
    while let Some(packet) = packets.next().await {
        let Some(server) = server.upgrade() else {
            debug!("Event server dropped, relay stopping");
            return;
        };
        if packet.origin == server.node_id {
            continue;
        }
        let delivered = server.deliver_local(&packet);
        debug!(
            origin = %packet.origin,
            event = %packet.event,
            delivered,
            "Relayed remote event"
        );
    }
    error!("Backplane subscription ended, remote events are no longer relayed");
    alive.send_replace(false);
}
