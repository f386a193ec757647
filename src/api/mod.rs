//! Operational HTTP surface for live-events
//!
//! Liveness, readiness and build information only. Consumer workers and the
//! tracker report their state into a shared [`HealthState`].

pub mod health;
pub mod server;

pub use health::{build_info, health_check, ready_check, HealthState};
pub use server::{create_router, create_server, shutdown_signal};

/// Build information populated at compile time
pub const BUILD_INFO: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    commit: match option_env!("GIT_COMMIT") {
        Some(commit) => commit,
        None => "unknown",
    },
    build_time: match option_env!("BUILD_TIME") {
        Some(time) => time,
        None => "unknown",
    },
};

/// Build information structure
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    /// Application version from Cargo.toml
    pub version: &'static str,
    /// Git commit hash
    pub commit: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
}

/// Health check response
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Ready check response
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ReadyResponse {
    /// Overall readiness status
    pub status: HealthStatus,
    /// Per-component state, keyed by component name
    pub checks: std::collections::HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Last state a component reported
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    pub message: Option<String>,
    pub last_check: chrono::DateTime<chrono::Utc>,
}

/// Health status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Component is working
    Healthy,
    /// Component stopped or is draining, but nothing failed
    Degraded,
    /// Component failed
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Convert to HTTP status code
    pub fn to_status_code(&self) -> axum::http::StatusCode {
        match self {
            HealthStatus::Healthy | HealthStatus::Degraded => axum::http::StatusCode::OK,
            HealthStatus::Unhealthy => axum::http::StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
