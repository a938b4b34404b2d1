//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Document store (PostgreSQL)
//! - Backplane connections and fan-out adapters (Redis)
//! - Connection supervision

pub mod cache;
pub mod database;
pub mod supervisor;

pub use supervisor::{Connectable, ConnectionSupervisor};
