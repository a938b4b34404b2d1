//! Health Check Handlers
//!
//! Provides health check endpoints for Kubernetes-style liveness and readiness probes.
//!
//! # Endpoints
//! - `GET /health/live` - Liveness probe (is the server running?)
//! - `GET /health/ready` - Readiness probe (can the server accept traffic?)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::future::Future;
use std::time::Instant;

use crate::infrastructure::cache::ConnectionState;
use crate::startup::AppState;

/// Server start time for uptime calculation
static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Initialize the server start time (call during startup)
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

/// Detailed health check response
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

/// Individual service health checks
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub database: ServiceHealth,
    pub redis: ServiceHealth,
    pub realtime: RealtimeHealth,
}

/// Health status for individual services
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Realtime event server health
#[derive(Debug, Serialize)]
pub struct RealtimeHealth {
    pub status: HealthStatus,
    pub relay_alive: bool,
    pub active_connections: usize,
}

/// Overall health status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Simple liveness response
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Readiness response while startup is still running
#[derive(Debug, Serialize)]
pub struct StartingResponse {
    pub status: HealthStatus,
    pub message: &'static str,
}

/// Liveness probe - checks if the server is running
/// Returns 200 if alive, used by Kubernetes to restart dead pods
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe - checks if the server can accept traffic
/// Returns 503 until startup completes or while the store is unreachable
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if !state.readiness.is_ready() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(StartingResponse {
                status: HealthStatus::Unhealthy,
                message: "Startup in progress",
            }),
        )
            .into_response();
    }

    let db_health = check_database(&state).await;
    let redis_health = check_redis(&state).await;
    let realtime = check_realtime(&state);

    let overall_status = determine_overall_status(&db_health, &redis_health, &realtime);

    let response = DetailedHealthResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks: HealthChecks {
            database: db_health,
            redis: redis_health,
            realtime,
        },
    };

    // Return 503 if unhealthy
    let status_code = match overall_status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response)).into_response()
}

/// Run `check`, grading it by latency against `degraded_after_ms`
async fn timed<E, F>(label: &str, degraded_after_ms: u64, check: F) -> ServiceHealth
where
    E: std::fmt::Display,
    F: Future<Output = Result<(), E>>,
{
    let start = Instant::now();
    match check.await {
        Ok(()) => {
            let latency = start.elapsed().as_millis() as u64;
            ServiceHealth {
                status: if latency < degraded_after_ms {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                },
                latency_ms: Some(latency),
                message: None,
            }
        }
        Err(e) => ServiceHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(format!("{} check failed: {}", label, e)),
        },
    }
}

async fn check_database(state: &AppState) -> ServiceHealth {
    timed("Database", 100, state.store.ping()).await
}

/// The shared backplane connection; never connecting is reported, not retried
async fn check_redis(state: &AppState) -> ServiceHealth {
    match state.cache.state() {
        ConnectionState::Connected => timed("Redis", 50, state.cache.ping()).await,
        other => ServiceHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            message: Some(format!("Redis connection is {:?}", other)),
        },
    }
}

/// Without the relay, events emitted by other processes never arrive
fn check_realtime(state: &AppState) -> RealtimeHealth {
    let relay_alive = state.events.relay_alive();
    RealtimeHealth {
        status: if relay_alive {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        },
        relay_alive,
        active_connections: state.events.socket_count(),
    }
}

/// Determine overall health based on individual checks
fn determine_overall_status(
    db: &ServiceHealth,
    redis: &ServiceHealth,
    realtime: &RealtimeHealth,
) -> HealthStatus {
    // The store and the relay are critical; the cache connection only degrades
    if db.status == HealthStatus::Unhealthy || realtime.status == HealthStatus::Unhealthy {
        return HealthStatus::Unhealthy;
    }

    if db.status == HealthStatus::Degraded || redis.status != HealthStatus::Healthy {
        return HealthStatus::Degraded;
    }

    HealthStatus::Healthy
}
