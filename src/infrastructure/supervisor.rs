//! Connection supervision.
//!
//! Connects the document store and then the backplane, and re-runs that
//! sequence every time the store reports a disconnect.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

use super::cache::BackplaneConnection;
use crate::domain::{DocumentStore, StoreError, StoreEvent};

/// A connection whose connect step logs its own failures
#[async_trait]
pub trait Connectable: Send + Sync {
    async fn connect(&self);
}

#[async_trait]
impl Connectable for BackplaneConnection {
    async fn connect(&self) {
        BackplaneConnection::connect(self).await
    }
}

pub struct ConnectionSupervisor {
    store: Arc<dyn DocumentStore>,
    backplane: Arc<dyn Connectable>,
}

impl ConnectionSupervisor {
    pub fn new(store: Arc<dyn DocumentStore>, backplane: Arc<dyn Connectable>) -> Self {
        Self { store, backplane }
    }

    /// Connect the store, then the backplane. Only the store can fail this.
    pub async fn connect(&self) -> Result<String, StoreError> {
        let host = match self.store.connect().await {
            Ok(host) => host,
            Err(err) => {
                error!(error = %err, "Error connecting to database");
                return Err(err);
            }
        };
        self.backplane.connect().await;
        Ok(host)
    }

    /// Reconnect on every store disconnect until the event channel closes.
    ///
    /// Subscribe with [`DocumentStore::events`] before the initial
    /// [`connect`](Self::connect) so no disconnect is missed. A failed
    /// reconnect is returned to the caller.
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<StoreEvent>,
    ) -> Result<(), StoreError> {
        loop {
            match events.recv().await {
                Ok(StoreEvent::Connected) => {}
                Ok(StoreEvent::Disconnected) => {
                    warn!("Database disconnected, reconnecting");
                    self.connect().await?;
                    info!("Database connection restored");
                    // Events emitted by the reconnect itself are stale
                    events = events.resubscribe();
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed store events, reconnecting");
                    self.connect().await?;
                    events = events.resubscribe();
                }
                Err(RecvError::Closed) => {
                    info!("Store event channel closed, supervisor stopping");
                    return Ok(());
                }
            }
        }
    }
}
