//! Document store contract.
//!
//! Documents are schemaless JSON objects grouped into named collections.
//! The store also publishes its connection lifecycle so the process can
//! react when the durable store goes away.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

/// Connection lifecycle notifications emitted by a [`DocumentStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The store is reachable again (or for the first time)
    Connected,
    /// The store was lost; in-flight and future queries fail until reconnect
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document store is not connected")]
    NotConnected,

    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    /// A unique index rejected the write
    #[error("duplicate document: {0}")]
    Duplicate(String),

    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Match documents whose field equals one of the given values (`$or`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<(String, String)>,
}

impl Filter {
    /// Filter with a single `field == value` clause
    pub fn eq(field: &str, value: impl Into<String>) -> Self {
        Self::default().or(field, value)
    }

    /// Add an alternative clause
    pub fn or(mut self, field: &str, value: impl Into<String>) -> Self {
        self.clauses.push((field.to_owned(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, String)] {
        &self.clauses
    }

    /// Evaluate the filter against an in-memory document
    pub fn matches(&self, document: &Value) -> bool {
        self.clauses.iter().any(|(field, expected)| {
            document
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|actual| actual == expected)
        })
    }
}

/// Durable document storage.
///
/// Implementations own their connection pool; `connect` may be called again
/// after a [`StoreEvent::Disconnected`] to re-establish it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Establish the connection. Returns the host that was reached.
    async fn connect(&self) -> Result<String, StoreError>;

    /// Subscribe to connection lifecycle events
    fn events(&self) -> broadcast::Receiver<StoreEvent>;

    /// Find the first document of `collection` matching `filter`
    async fn find_one(&self, collection: &str, filter: &Filter)
        -> Result<Option<Value>, StoreError>;

    /// Insert a JSON object into `collection`
    async fn insert_one(&self, collection: &str, document: Value) -> Result<(), StoreError>;

    /// Round-trip check used by readiness probes
    async fn ping(&self) -> Result<(), StoreError>;
}
