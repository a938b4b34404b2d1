//! # Configuration Module
//!
//! This module handles application configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__, plus the plain names
//!   `DATABASE_URL`, `REDIS_URL`, `SECRET_KEY_ONE`, `SECRET_KEY_TWO`,
//!   `CLIENT_URL`, `PORT`, `RUN_ENV`)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use social_server::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Server will listen on {}", settings.server_addr());
//! ```

mod settings;

pub use settings::*;

#[cfg(test)]
pub(crate) use settings::tests::test_settings;
