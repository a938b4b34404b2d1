//! PostgreSQL Document Store
//!
//! Implements [`DocumentStore`] on a single `documents` table holding one
//! JSONB object per row, keyed by collection name.
//!
//! Connection loss is detected from the errors queries return: the first
//! I/O, TLS or pool failure after a successful connect emits
//! [`StoreEvent::Disconnected`] so the supervisor can reconnect.

use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{create_pool, run_migrations};
use crate::config::DatabaseSettings;
use crate::domain::{DocumentStore, Filter, StoreError, StoreEvent};

/// Capacity of the lifecycle event channel
const EVENT_CAPACITY: usize = 16;

pub struct PgDocumentStore {
    settings: DatabaseSettings,
    pool: RwLock<Option<PgPool>>,
    connected: AtomicBool,
    events: broadcast::Sender<StoreEvent>,
}

impl PgDocumentStore {
    pub fn new(settings: DatabaseSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            settings,
            pool: RwLock::new(None),
            connected: AtomicBool::new(false),
            events,
        }
    }

    fn pool(&self) -> Result<PgPool, StoreError> {
        self.pool.read().clone().ok_or(StoreError::NotConnected)
    }

    /// Map a driver error, announcing the disconnect on the first
    /// connection-level failure.
    fn classify(&self, err: sqlx::Error) -> StoreError {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => {
                if self.connected.swap(false, Ordering::SeqCst) {
                    warn!(error = %err, "Lost connection to database");
                    let _ = self.events.send(StoreEvent::Disconnected);
                }
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(db.message().to_owned())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Host part of a connection URL, without credentials or database name
pub(crate) fn host_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let rest = rest.rsplit_once('@').map_or(rest, |(_, rest)| rest);
    rest.split(['/', '?']).next().unwrap_or(rest).to_owned()
}

/// `document ->> $2 = $3 OR document ->> $4 = $5 ...`
fn filter_clause(filter: &Filter) -> String {
    let mut sql = String::new();
    for index in 0..filter.clauses().len() {
        if index > 0 {
            sql.push_str(" OR ");
        }
        let field = 2 + index * 2;
        let _ = write!(sql, "document ->> ${} = ${}", field, field + 1);
    }
    sql
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[instrument(skip(self), fields(host = %host_of(&self.settings.url)))]
    async fn connect(&self) -> Result<String, StoreError> {
        let pool = create_pool(&self.settings)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        run_migrations(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if let Some(previous) = self.pool.write().replace(pool) {
            tokio::spawn(async move { previous.close().await });
        }
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events.send(StoreEvent::Connected);

        let host = host_of(&self.settings.url);
        info!(host = %host, "Successfully connected to database");
        Ok(host)
    }

    fn events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        if filter.clauses().is_empty() {
            return Ok(None);
        }
        let pool = self.pool()?;

        let sql = format!(
            "SELECT document FROM documents WHERE collection = $1 AND ({}) \
             ORDER BY created_at LIMIT 1",
            filter_clause(filter)
        );
        let mut query = sqlx::query_scalar::<_, Value>(&sql).bind(collection);
        for (field, value) in filter.clauses() {
            query = query.bind(field).bind(value);
        }

        query
            .fetch_optional(&pool)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn insert_one(&self, collection: &str, document: Value) -> Result<(), StoreError> {
        if !document.is_object() {
            return Err(StoreError::Malformed("document must be a JSON object".into()));
        }
        let pool = self.pool()?;

        let id = document
            .get("_id")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
            .unwrap_or_else(Uuid::new_v4);

        sqlx::query("INSERT INTO documents (id, collection, document) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(collection)
            .bind(&document)
            .execute(&pool)
            .await
            .map_err(|e| self.classify(e))?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let pool = self.pool()?;
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| self.classify(e))?;
        Ok(())
    }
}
