//! Monitoring API
//!
//! Health probes and Prometheus exposition. These routes are public.

use std::time::Instant;

use axum::{
    extract::State,
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProbeResponse {
    pub status: String,
}

#[derive(Clone)]
pub struct MonitoringState {
    /// Absent when no recorder was installed (tests)
    pub metrics: Option<PrometheusHandle>,
    pub start_time: Instant,
}

impl MonitoringState {
    pub fn new(metrics: Option<PrometheusHandle>) -> Self {
        Self {
            metrics,
            start_time: Instant::now(),
        }
    }
}

/// Service health
#[utoipa::path(
    get,
    path = "/health",
    tag = "monitoring",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<MonitoringState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "monitoring",
    responses((status = 200, description = "Process is alive", body = ProbeResponse))
)]
pub async fn liveness() -> Json<ProbeResponse> {
    Json(ProbeResponse { status: "UP".to_string() })
}

/// Readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "monitoring",
    responses((status = 200, description = "Ready to serve", body = ProbeResponse))
)]
pub async fn readiness() -> Json<ProbeResponse> {
    Json(ProbeResponse { status: "READY".to_string() })
}

/// Prometheus text exposition
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "monitoring",
    responses((status = 200, description = "Prometheus metrics", content_type = "text/plain"))
)]
pub async fn metrics(State(state): State<MonitoringState>) -> Response {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
}

pub fn monitoring_router(state: MonitoringState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/metrics", get(metrics))
        .with_state(state)
}
