//! Application Startup
//!
//! Application building and server initialization.
//!
//! The HTTP pipeline is assembled through [`AppServer`], whose stage
//! parameter only moves forward:
//! `Unstarted -> SecurityConfigured -> StandardConfigured -> RoutesConfigured -> ErrorHandlerConfigured`.
//! Only the last stage can produce a [`Router`].

use std::any::Any;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use config::ConfigError;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, cors::CorsLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::config::Settings;
use crate::domain::{DocumentStore, RealtimeError, StoreEvent};
use crate::infrastructure::cache::{BackplaneConnection, RedisAdapter};
use crate::infrastructure::database::PgDocumentStore;
use crate::infrastructure::ConnectionSupervisor;
use crate::presentation::http::handlers::health::init_server_start;
use crate::presentation::http::{create_router, not_found};
use crate::presentation::middleware::{
    create_cors_layer, create_security_headers_layer, parameter_pollution, session_middleware,
    SecurityHeadersLayer, SessionConfig,
};
use crate::presentation::websocket::EventServer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn DocumentStore>,
    pub cache: BackplaneConnection,
    pub events: Arc<EventServer>,
    pub readiness: Readiness,
}

/// Set once the server may accept traffic
#[derive(Debug, Clone, Default)]
pub struct Readiness(Arc<AtomicBool>);

impl Readiness {
    pub fn mark_ready(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Nothing configured yet
pub struct Unstarted;

/// Session, parameter pollution, hardening headers and CORS are known
pub struct SecurityConfigured {
    session: SessionConfig,
    headers: SecurityHeadersLayer,
    cors: CorsLayer,
}

/// Compression and body parsing limits are known
pub struct StandardConfigured {
    security: SecurityConfigured,
    body_limit: usize,
}

/// Routes are mounted
pub struct RoutesConfigured {
    standard: StandardConfigured,
    routes: Router<AppState>,
}

/// The not-found fallback is installed; the pipeline is complete
pub struct ErrorHandlerConfigured {
    standard: StandardConfigured,
    routes: Router<AppState>,
}

/// HTTP pipeline under construction
pub struct AppServer<Stage> {
    state: AppState,
    stage: Stage,
}

impl AppServer<Unstarted> {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            stage: Unstarted,
        }
    }

    /// Configure the security stage from settings
    pub fn security_middleware(self) -> Result<AppServer<SecurityConfigured>, ConfigError> {
        let settings = &self.state.settings;
        let development = settings.is_development();

        let stage = SecurityConfigured {
            session: SessionConfig::new(&settings.session, !development)?,
            headers: create_security_headers_layer(development),
            cors: create_cors_layer(&settings.cors)?,
        };

        Ok(AppServer {
            state: self.state,
            stage,
        })
    }
}

impl AppServer<SecurityConfigured> {
    /// Configure compression and the body size ceiling
    pub fn standard_middleware(self) -> AppServer<StandardConfigured> {
        let body_limit = self.state.settings.http.body_limit_bytes;
        AppServer {
            state: self.state,
            stage: StandardConfigured {
                security: self.stage,
                body_limit,
            },
        }
    }
}

impl AppServer<StandardConfigured> {
    pub fn route_middleware(self, routes: Router<AppState>) -> AppServer<RoutesConfigured> {
        AppServer {
            state: self.state,
            stage: RoutesConfigured {
                standard: self.stage,
                routes,
            },
        }
    }
}

impl AppServer<RoutesConfigured> {
    /// Answer every unmatched request with a 404 naming its path
    pub fn global_handler(self) -> AppServer<ErrorHandlerConfigured> {
        let RoutesConfigured { standard, routes } = self.stage;
        AppServer {
            state: self.state,
            stage: ErrorHandlerConfigured {
                standard,
                routes: routes.fallback(not_found),
            },
        }
    }
}

impl AppServer<ErrorHandlerConfigured> {
    /// Apply the middleware stack and attach state.
    ///
    /// Layers are listed innermost first; a request meets them bottom-up.
    pub fn into_router(self) -> Router {
        let ErrorHandlerConfigured { standard, routes } = self.stage;
        let StandardConfigured {
            security,
            body_limit,
        } = standard;

        routes
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(CompressionLayer::new())
            .layer(security.cors)
            .layer(security.headers)
            .layer(middleware::from_fn(parameter_pollution))
            .layer(middleware::from_fn_with_state(
                security.session,
                session_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state)
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "Handler panicked");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Run the full pipeline over `state` and the application routes
pub fn build_router(state: AppState) -> Result<Router, ConfigError> {
    Ok(AppServer::new(state)
        .security_middleware()?
        .standard_middleware()
        .route_middleware(create_router())
        .global_handler()
        .into_router())
}

/// Connect a publisher and a subscriber duplicated from `cache` and
/// install them as the event server's adapter.
pub async fn create_event_server(
    cache: &BackplaneConnection,
) -> Result<Arc<EventServer>, RealtimeError> {
    let publisher = cache.duplicate("realtime-pub");
    let subscriber = cache.duplicate("realtime-sub");
    let adapter = RedisAdapter::connect(&publisher, &subscriber).await?;
    EventServer::with_adapter(Arc::new(adapter)).await
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
    supervisor: Arc<ConnectionSupervisor>,
    store_events: broadcast::Receiver<StoreEvent>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        init_server_start();
        let settings = Arc::new(settings);

        let store: Arc<dyn DocumentStore> =
            Arc::new(PgDocumentStore::new(settings.database.clone()));
        let cache = BackplaneConnection::new("cache", &settings.redis.url)?;
        let supervisor = Arc::new(ConnectionSupervisor::new(
            store.clone(),
            Arc::new(cache.clone()),
        ));

        // Subscribe first so a disconnect during startup is not lost
        let store_events = store.events();
        supervisor.connect().await?;

        // Bind to address
        let listener = TcpListener::bind(settings.server_addr()).await?;
        info!("Listening on {}", listener.local_addr()?);

        let events = create_event_server(&cache).await?;
        info!(node_id = %events.node_id(), "Realtime event server ready");

        let state = AppState {
            settings,
            store,
            cache,
            events,
            readiness: Readiness::default(),
        };
        let router = build_router(state.clone())?;

        Ok(Self {
            listener,
            router,
            state,
            supervisor,
            store_events,
        })
    }

    /// Serve until a shutdown signal arrives, reconnection fails or the
    /// backplane subscription ends
    pub async fn run_until_stopped(self) -> Result<()> {
        let Self {
            listener,
            router,
            state,
            supervisor,
            store_events,
        } = self;

        let server = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .into_future();

        state.readiness.mark_ready();
        info!("Server ready to accept connections");

        tokio::select! {
            result = server => result?,
            Err(err) = supervisor.run(store_events) => {
                error!(error = %err, "Reconnection failed, stopping server");
                return Err(err.into());
            }
            _ = state.events.relay_stopped() => {
                error!("Realtime fan-out lost, stopping server");
                return Err(RealtimeError::Backplane("subscription ended".into()).into());
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
