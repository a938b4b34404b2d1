//! Shared Utilities
//!
//! Common utilities used across all layers.

pub mod error;
pub mod helpers;
pub mod validation;
