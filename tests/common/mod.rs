//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use axum_test::TestServer;
use fake::{faker::internet::en::SafeEmail, Fake};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

use social_server::config::{
    CorsSettings, DatabaseSettings, HttpSettings, RedisSettings, ServerSettings, SessionSettings,
    Settings, DEFAULT_BODY_LIMIT_BYTES,
};
use social_server::domain::{DocumentStore, Filter, StoreError, StoreEvent, AUTH_COLLECTION};
use social_server::infrastructure::cache::{BackplaneConnection, MemoryBackplane};
use social_server::presentation::websocket::EventServer;
use social_server::startup::{build_router, AppState, Readiness};

/// Trusted client origin used by every test app
pub const CLIENT_URL: &str = "http://localhost:3000";

/// Nothing listens on the discard port
const UNREACHABLE_REDIS: &str = "redis://127.0.0.1:9/";

/// Document store kept in memory
pub struct InMemoryStore {
    documents: Mutex<Vec<(String, Value)>>,
    unavailable: AtomicBool,
    stale_reads: AtomicBool,
    events: broadcast::Sender<StoreEvent>,
}

/// Fields the auth collection's unique indexes cover
const UNIQUE_AUTH_FIELDS: [&str; 2] = ["username", "email"];

impl InMemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(8);
        Self {
            documents: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
            stale_reads: AtomicBool::new(false),
            events,
        }
    }

    /// Every stored document of `collection`
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.documents
            .lock()
            .iter()
            .filter(|(c, _)| c == collection)
            .map(|(_, d)| d.clone())
            .collect()
    }

    /// Make every operation fail as if the database went away
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make lookups miss every document, as a concurrent writer's row would
    pub fn set_stale_reads(&self, stale: bool) {
        self.stale_reads.store(stale, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn connect(&self) -> Result<String, StoreError> {
        self.check()?;
        Ok("memory".into())
    }

    fn events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>, StoreError> {
        self.check()?;
        if self.stale_reads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .documents
            .lock()
            .iter()
            .find(|(c, d)| c == collection && filter.matches(d))
            .map(|(_, d)| d.clone()))
    }

    async fn insert_one(&self, collection: &str, document: Value) -> Result<(), StoreError> {
        self.check()?;
        let mut documents = self.documents.lock();
        if collection == AUTH_COLLECTION {
            let taken = documents.iter().any(|(c, existing)| {
                c == collection
                    && UNIQUE_AUTH_FIELDS
                        .iter()
                        .any(|field| existing.get(field) == document.get(field))
            });
            if taken {
                return Err(StoreError::Duplicate("auth username or email".into()));
            }
        }
        documents.push((collection.to_owned(), document));
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}

/// Settings for a development deployment trusting [`CLIENT_URL`]
pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://localhost/social_test".into(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: 1,
        },
        redis: RedisSettings {
            url: UNREACHABLE_REDIS.into(),
        },
        session: SessionSettings {
            secret_key_one: "integration-secret-key-one-0123456789abcdef".into(),
            secret_key_two: "integration-secret-key-two-0123456789abcdef".into(),
            max_age_secs: 3600,
        },
        cors: CorsSettings {
            client_url: CLIENT_URL.into(),
        },
        http: HttpSettings {
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
        },
        environment: "development".into(),
    }
}

/// Test application builder
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
}

impl TestApp {
    /// A ready application over an in-memory store and backplane
    pub async fn new() -> Self {
        Self::with_settings(test_settings()).await
    }

    pub async fn with_settings(settings: Settings) -> Self {
        let app = Self::unready(settings).await;
        app.state.readiness.mark_ready();
        app
    }

    /// An application whose startup has not finished
    pub async fn unready(settings: Settings) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = test_state(settings, store.clone(), &MemoryBackplane::new()).await;
        let router = build_router(state.clone()).unwrap();

        Self {
            router,
            state,
            store,
        }
    }

    /// An axum-test server over the router, keeping cookies between calls
    pub fn server(&self) -> TestServer {
        let mut server = TestServer::new(self.router.clone()).unwrap();
        server.save_cookies();
        server
    }

    /// Send a prepared request through the full pipeline
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: &Value) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Make a POST request with an url-encoded body
    pub async fn post_form(&self, uri: &str, body: &str) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
    }
}

/// Application state over `store`, a never-connected cache and an event
/// server attached to `backplane`
pub async fn test_state(
    settings: Settings,
    store: Arc<InMemoryStore>,
    backplane: &MemoryBackplane,
) -> AppState {
    let cache = BackplaneConnection::new("cache", &settings.redis.url).unwrap();
    let events = EventServer::with_adapter(Arc::new(backplane.adapter()))
        .await
        .unwrap();

    AppState {
        settings: Arc::new(settings),
        store,
        cache,
        events,
        readiness: Readiness::default(),
    }
}

/// Read a response body as JSON
pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

/// Assert the uniform error shape
pub async fn assert_error(response: Response, status: StatusCode, message: &str) {
    assert_eq!(response.status(), status);
    let body = body_json(response).await;
    assert_eq!(
        body,
        json!({ "message": message, "status": "error", "statusCode": status.as_u16() })
    );
}

/// Generate a username within the 4 to 8 character rule
pub fn unique_username() -> String {
    format!("u{}", &uuid::Uuid::new_v4().simple().to_string()[..7])
}

/// Generate a unique test email
pub fn unique_email() -> String {
    let email: String = SafeEmail().fake();
    format!("{}{}", &uuid::Uuid::new_v4().simple().to_string()[..6], email)
}

/// A signup body that passes validation
pub fn signup_body() -> Value {
    json!({
        "username": unique_username(),
        "password": "s3cret",
        "email": unique_email(),
        "avatarColor": "#9c27b0",
        "avatarImage": "data:image/png;base64,iVBORw0KGgo="
    })
}
