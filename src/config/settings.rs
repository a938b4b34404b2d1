//! Application settings and configuration structures.

use axum::http::HeaderValue;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Document store configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis backplane configuration
    pub redis: RedisSettings,

    /// Session cookie signing
    pub session: SessionSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// Body parsing limits
    pub http: HttpSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL document store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    pub url: String,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Signing secret; new cookies are signed with this one
    pub secret_key_one: String,

    /// Previous signing secret, still accepted for verification
    pub secret_key_two: String,

    /// Maximum session age in seconds
    pub max_age_secs: u64,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// The single trusted client origin
    pub client_url: String,
}

/// Request body configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    /// Maximum JSON / url-encoded body size in bytes
    pub body_limit_bytes: usize,
}

/// Minimum required length for session secrets (256 bits = 32 bytes)
pub const MIN_SESSION_SECRET_LENGTH: usize = 32;

/// Default body ceiling (50 MiB)
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed, or
    /// if any required value is missing or unsafe (see [`Settings::validate`]).
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        let settings: Self = Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("session.max_age_secs", 24 * 60 * 60)?
            .set_default("http.body_limit_bytes", DEFAULT_BODY_LIMIT_BYTES as i64)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__SERVER__PORT=8000 -> server.port = 8000
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option(
                "server.port",
                std::env::var("PORT").or_else(|_| std::env::var("SERVER_PORT")).ok(),
            )?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("session.secret_key_one", std::env::var("SECRET_KEY_ONE").ok())?
            .set_override_option("session.secret_key_two", std::env::var("SECRET_KEY_TWO").ok())?
            .set_override_option("cors.client_url", std::env::var("CLIENT_URL").ok())?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations that deserialize but must not be served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("database.url", &self.database.url),
            ("redis.url", &self.redis.url),
            ("session.secret_key_one", &self.session.secret_key_one),
            ("session.secret_key_two", &self.session.secret_key_two),
            ("cors.client_url", &self.cors.client_url),
            ("environment", &self.environment),
        ];
        if let Some((key, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Message(format!("Configuration {} is undefined", key)));
        }

        for (key, secret) in [
            ("session.secret_key_one", &self.session.secret_key_one),
            ("session.secret_key_two", &self.session.secret_key_two),
        ] {
            if secret.len() < MIN_SESSION_SECRET_LENGTH {
                return Err(ConfigError::Message(format!(
                    "{} must be at least {} characters for security. Current length: {}",
                    key,
                    MIN_SESSION_SECRET_LENGTH,
                    secret.len()
                )));
            }
        }

        if self.session.secret_key_one == self.session.secret_key_two {
            return Err(ConfigError::Message(
                "session.secret_key_one and session.secret_key_two must differ".into(),
            ));
        }

        if self.cors.client_url.trim() == "*" {
            return Err(ConfigError::Message(
                "cors.client_url must name a single origin; a wildcard cannot be combined with credentials".into(),
            ));
        }
        self.cors.allowed_origin()?;

        Ok(())
    }

    /// Whether the server runs in a development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl CorsSettings {
    /// The trusted origin as a header value
    pub fn allowed_origin(&self) -> Result<HeaderValue, ConfigError> {
        HeaderValue::from_str(self.client_url.trim_end_matches('/')).map_err(|e| {
            ConfigError::Message(format!("cors.client_url is not a valid origin: {}", e))
        })
    }
}
