//! # Social Server
//!
//! Application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Document store and Redis backplane connections
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use social_server::config::Settings;
use social_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());
    social_server::telemetry::init_tracing(&environment);

    info!("Starting Social Server...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;
    application.run_until_stopped().await?;

    Ok(())
}
