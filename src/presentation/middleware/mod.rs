//! Middleware
//!
//! Tower middleware for the security stage, in the order requests meet it:
//! session, parameter pollution, hardening headers, CORS.

pub mod cors;
pub mod hpp;
pub mod security;
pub mod session;

pub use cors::create_cors_layer;
pub use hpp::parameter_pollution;
pub use security::{create_security_headers_layer, SecurityHeadersConfig, SecurityHeadersLayer};
pub use session::{session_middleware, Session, SessionConfig, SESSION_COOKIE};
