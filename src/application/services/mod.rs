//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: signup lookups and auth document creation

pub mod auth_service;

pub use auth_service::{AuthError, AuthService, AuthServiceImpl, UID_LENGTH};
