//! Backplane Connection
//!
//! A named handle on the shared Redis endpoint with an explicit connection
//! state. Clones share one connection; [`BackplaneConnection::duplicate`]
//! opens an independent one against the same endpoint.

use std::sync::Arc;

use parking_lot::RwLock;
use redis::aio::{ConnectionManager, PubSub};
use redis::Client;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::RealtimeError;

/// Connection state of a [`BackplaneConnection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, thiserror::Error)]
pub enum BackplaneError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error("backplane connection '{0}' is not connected")]
    NotConnected(String),

    #[error("backplane connection '{0}' is already connecting")]
    ConnectInFlight(String),
}

impl From<BackplaneError> for RealtimeError {
    fn from(err: BackplaneError) -> Self {
        RealtimeError::Backplane(err.to_string())
    }
}

struct Inner {
    name: String,
    url: String,
    client: Client,
    state: RwLock<ConnectionState>,
    manager: RwLock<Option<ConnectionManager>>,
}

/// Process-wide handle on the Redis backplane
#[derive(Clone)]
pub struct BackplaneConnection {
    inner: Arc<Inner>,
}

impl BackplaneConnection {
    /// Create a disconnected handle. Only the URL is validated here.
    pub fn new(name: &str, url: &str) -> Result<Self, BackplaneError> {
        let client = Client::open(url)?;
        Ok(Self::from_client(name, url, client))
    }

    fn from_client(name: &str, url: &str, client: Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.to_owned(),
                url: url.to_owned(),
                client,
                state: RwLock::new(ConnectionState::Disconnected),
                manager: RwLock::new(None),
            }),
        }
    }

    /// New handle on the same endpoint with its own connection and state
    pub fn duplicate(&self, name: &str) -> Self {
        Self::from_client(name, &self.inner.url, self.inner.client.clone())
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.inner.state.write() = state;
    }

    /// Move to `Connecting` unless a connect is already in flight
    fn begin_connect(&self) -> Result<(), BackplaneError> {
        let mut state = self.inner.state.write();
        if *state == ConnectionState::Connecting {
            return Err(BackplaneError::ConnectInFlight(self.inner.name.clone()));
        }
        *state = ConnectionState::Connecting;
        Ok(())
    }

    /// Connect and ping, logging instead of returning failures.
    ///
    /// A call made while another connect is in flight returns immediately.
    #[instrument(skip(self), fields(name = %self.inner.name))]
    pub async fn connect(&self) {
        match self.try_connect().await {
            Ok(_) => {}
            Err(BackplaneError::ConnectInFlight(_)) => {
                debug!("Backplane connect already in flight");
            }
            Err(err) => {
                error!(error = %err, "Backplane connection failed");
            }
        }
    }

    /// Connect and ping, returning the shared connection manager.
    #[instrument(skip(self), fields(name = %self.inner.name, url = %self.inner.url))]
    pub async fn try_connect(&self) -> Result<ConnectionManager, BackplaneError> {
        self.begin_connect()?;
        info!("Connecting to Redis...");

        let attempt = async {
            let mut manager = ConnectionManager::new(self.inner.client.clone()).await?;
            let reply = redis::cmd("PING").query_async::<String>(&mut manager).await?;
            Ok::<_, redis::RedisError>((manager, reply))
        };

        match attempt.await {
            Ok((manager, reply)) => {
                *self.inner.manager.write() = Some(manager.clone());
                self.set_state(ConnectionState::Connected);
                info!(reply = %reply, "Redis connection established");
                Ok(manager)
            }
            Err(err) => {
                self.set_state(ConnectionState::Disconnected);
                Err(err.into())
            }
        }
    }

    /// Open a dedicated subscriber connection
    #[instrument(skip(self), fields(name = %self.inner.name, url = %self.inner.url))]
    pub async fn open_pubsub(&self) -> Result<PubSub, BackplaneError> {
        self.begin_connect()?;

        match self.inner.client.get_async_pubsub().await {
            Ok(pubsub) => {
                self.set_state(ConnectionState::Connected);
                info!("Redis subscriber connection established");
                Ok(pubsub)
            }
            Err(err) => {
                self.set_state(ConnectionState::Disconnected);
                Err(err.into())
            }
        }
    }

    /// The connection manager of the last successful connect
    pub fn manager(&self) -> Result<ConnectionManager, BackplaneError> {
        self.inner
            .manager
            .read()
            .clone()
            .ok_or_else(|| BackplaneError::NotConnected(self.inner.name.clone()))
    }

    /// Liveness check; a failure marks the handle disconnected
    pub async fn ping(&self) -> Result<(), BackplaneError> {
        let mut manager = self.manager()?;
        match redis::cmd("PING").query_async::<String>(&mut manager).await {
            Ok(_) => {
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(err) => {
                warn!(name = %self.inner.name, error = %err, "Redis ping failed");
                self.set_state(ConnectionState::Disconnected);
                Err(err.into())
            }
        }
    }
}

impl std::fmt::Debug for BackplaneConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackplaneConnection")
            .field("name", &self.inner.name)
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}
