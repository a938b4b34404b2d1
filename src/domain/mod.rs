//! # Domain Layer
//!
//! Data contracts shared by the application services and the infrastructure
//! adapters. Nothing here knows about HTTP, Redis or PostgreSQL.
//!
//! ## Structure
//!
//! - **store**: the document store contract and its connection events
//! - **auth**: the persisted shape of a signed-up user
//! - **realtime**: the packet and adapter contract for cross-process fan-out

pub mod auth;
pub mod realtime;
pub mod store;

// Re-export commonly used types
pub use auth::{AuthDocument, AUTH_COLLECTION};
pub use realtime::{Adapter, BroadcastPacket, RealtimeError};
pub use store::{DocumentStore, Filter, StoreError, StoreEvent};
