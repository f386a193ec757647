//! HTTP server implementation for live-events
//!
//! This module sets up the Axum web server for the operational endpoints,
//! with request tracing middleware and graceful shutdown handling.

use axum::{
    extract::MatchedPath,
    http::{HeaderName, Request},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use uuid::Uuid;

use crate::{
    api::health::{build_info, health_check, ready_check, HealthState},
    config::Config,
    error::{Error, Result},
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID generator
#[derive(Clone, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        Some(RequestId::new(id.parse().ok()?))
    }
}

/// Create the health router
pub fn create_router(config: &Config, health: Arc<HealthState>) -> Router {
    let routes = Router::new()
        .route("/healthz", get(health_check))
        .route("/readyz", get(ready_check))
        .route("/build", get(build_info))
        .with_state(health);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    routes
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let matched_path =
                        request.extensions().get::<MatchedPath>().map(MatchedPath::as_str);
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "http_request",
                        method = ?request.method(),
                        matched_path,
                        request_id,
                    )
                })
                .on_request(DefaultOnRequest::new().level(tracing::Level::DEBUG))
                .on_response(
                    DefaultOnResponse::new()
                        .level(tracing::Level::DEBUG)
                        .latency_unit(LatencyUnit::Millis),
                ),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// Serve the health endpoints until `shutdown` is cancelled
pub async fn create_server(
    config: Arc<Config>,
    health: Arc<HealthState>,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = create_router(&config, health);
    let addr: SocketAddr = config
        .server
        .address()
        .parse()
        .map_err(|e| Error::config(format!("Invalid server address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!(
        address = %addr,
        environment = %config.server.environment,
        "HTTP server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::internal(format!("Server error: {}", e)))
}

/// Shutdown signal handler
///
/// Waits for CTRL+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received CTRL+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HealthStatus;
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(&Config::default(), Arc::new(HealthState::new()));

        let response = app.oneshot(get("/healthz")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_build_endpoint() {
        let app = create_router(&Config::default(), Arc::new(HealthState::new()));

        let response = app.oneshot(get("/build")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_endpoint_reflects_components() {
        let health = Arc::new(HealthState::new());
        health
            .update_component(
                "partition-0".to_string(),
                HealthStatus::Unhealthy,
                Some("dead-letter publish failed".to_string()),
            )
            .await;
        let app = create_router(&Config::default(), health);

        let response = app.oneshot(get("/readyz")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_server_stops_on_cancel() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        let shutdown = CancellationToken::new();

        let server = tokio::spawn(create_server(
            Arc::new(config),
            Arc::new(HealthState::new()),
            shutdown.clone(),
        ));
        shutdown.cancel();

        assert!(server.await.unwrap().is_ok());
    }
}
