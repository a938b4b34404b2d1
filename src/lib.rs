//! # Social Server Library
//!
//! Server bootstrap for a social web application:
//! - An ordered HTTP middleware pipeline (security, parsing, routes, 404)
//! - Declarative request validation in front of handlers
//! - A closed error taxonomy with one wire shape
//! - A WebSocket event server whose broadcasts fan out across processes
//!   through Redis pub/sub
//! - PostgreSQL as a JSON document store
//!
//! ## Module Structure
//!
//! ```text
//! social_server/
//! +-- config/         Configuration management
//! +-- domain/         Store, auth document and realtime contracts
//! +-- application/    Services and DTOs
//! +-- infrastructure/ Document store, Redis backplane, reconnection
//! +-- presentation/   Routes, middleware and the WebSocket event server
//! +-- shared/         Errors, validation, helpers
//! ```

// Configuration module
pub mod config;

// Domain layer - contracts
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
