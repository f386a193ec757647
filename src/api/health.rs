//! Health check endpoints for live-events
//!
//! Liveness is unconditional; readiness aggregates the states reported by
//! the consumer, the partition workers and the tracker.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::{ComponentHealth, HealthResponse, HealthStatus, ReadyResponse, BUILD_INFO};

/// Application state for health checks
#[derive(Clone, Default)]
pub struct HealthState {
    /// Shared state for component health tracking
    pub components: Arc<RwLock<HashMap<String, ComponentHealth>>>,

    /// Components that must have reported before the service is ready
    required: Arc<Vec<String>>,
}

impl HealthState {
    /// Create a new health state
    pub fn new() -> Self {
        Self::default()
    }

    /// Health state that stays unready until every named component reports
    pub fn with_required<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: Arc::default(),
            required: Arc::new(components.into_iter().map(Into::into).collect()),
        }
    }

    /// Update component health status
    pub async fn update_component(
        &self,
        name: String,
        status: HealthStatus,
        message: Option<String>,
    ) {
        let mut components = self.components.write().await;
        components.insert(
            name,
            ComponentHealth {
                status,
                message,
                last_check: Utc::now(),
            },
        );
    }

    /// Get overall health status
    pub async fn get_status(&self) -> HealthStatus {
        let components = self.components.read().await;

        if self.required.iter().any(|name| !components.contains_key(name)) {
            return HealthStatus::Unhealthy;
        }

        // If any component is unhealthy, overall status is unhealthy
        if components.values().any(|c| c.status == HealthStatus::Unhealthy) {
            return HealthStatus::Unhealthy;
        }

        // If any component is degraded, overall status is degraded
        if components.values().any(|c| c.status == HealthStatus::Degraded) {
            return HealthStatus::Degraded;
        }

        HealthStatus::Healthy
    }
}

/// Basic liveness check endpoint
///
/// Returns 200 OK if the service is alive.
/// This endpoint should be lightweight and not check external dependencies.
pub async fn health_check() -> Response {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Service is running".to_string()),
        timestamp: Utc::now(),
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// Readiness check endpoint
///
/// Returns 503 while a required component has not reported or any
/// component is unhealthy.
pub async fn ready_check(State(state): State<Arc<HealthState>>) -> Response {
    let components = state.components.read().await.clone();
    let overall_status = state.get_status().await;

    let response = ReadyResponse {
        status: overall_status,
        checks: components,
        timestamp: Utc::now(),
    };

    let status_code = overall_status.to_status_code();
    (status_code, Json(response)).into_response()
}

/// Build information endpoint
pub async fn build_info() -> Response {
    (StatusCode::OK, Json(&BUILD_INFO)).into_response()
}
