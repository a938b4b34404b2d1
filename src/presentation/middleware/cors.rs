//! CORS Middleware Configuration

use std::time::Duration;

use axum::http::Method;
use config::ConfigError;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::CorsSettings;

/// Methods accepted from the trusted origin, over HTTP and the realtime channel
pub const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Create CORS layer from settings.
///
/// Exactly one origin is allowed and credentials are enabled, so the
/// origin is never a wildcard. The allow-origin header is only sent back
/// to a request whose `Origin` matches it.
pub fn create_cors_layer(settings: &CorsSettings) -> Result<CorsLayer, ConfigError> {
    let origin = settings.allowed_origin()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600)))
}
