//! Monitoring listener
//!
//! `/healthz` and `/readyz` answer from the [`HealthRegistry`] fed by the host
//! after every gather round; `/metrics` renders the process-wide Prometheus
//! registry.

use crate::health::{HealthRegistry, HealthStatus};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::TextEncoder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Routes of the monitoring listener
pub fn router(health: HealthRegistry) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(health)
}

/// Bind `addr` and serve until the process exits
pub async fn serve(addr: SocketAddr, health: HealthRegistry) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Monitoring listener started");
    axum::serve(listener, router(health)).await
}

async fn healthz(State(health): State<HealthRegistry>) -> Response {
    let body = health.health().await;
    // Gather errors degrade; only a broken output fails liveness
    let code = match body.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (code, Json(body)).into_response()
}

async fn readyz(State(health): State<HealthRegistry>) -> Response {
    let body = health.readiness().await;
    let code = if body.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body)).into_response()
}

async fn metrics() -> Response {
    let mut body = String::new();
    match TextEncoder::new().encode_utf8(&prometheus::gather(), &mut body) {
        Ok(()) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
