//! HTTP Surface
//!
//! Routes, handlers and body extractors.

pub mod extractors;
pub mod form;
pub mod handlers;
pub mod routes;

pub use extractors::{Payload, RequestContext};
pub use routes::{create_router, not_found};
