//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    extract::OriginalUri,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::handlers;
use crate::application::dto::MessageResponse;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the application routes. Middleware and the fallback are added by
/// the server stages in [`crate::startup`].
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::home::index))
        .nest("/api/v1", api_routes())
        // Realtime event channel
        .route("/realtime", get(ws_handler))
        // Health check endpoints
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
}

/// API v1 routes
fn api_routes() -> Router<AppState> {
    Router::new().route("/signup", post(handlers::auth::signup()))
}

/// Catch-all for requests no route answered
pub async fn not_found(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(MessageResponse::new(format!("{} not found.", uri.path()))),
    )
}
