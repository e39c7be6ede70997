//! Liveness probes backed by the subscriber's health signal.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::instrument;

use crate::api::models::{HealthStatus, StatusResponse};
use crate::app_state::AppState;

/// Plain liveness probe: `200 OK` while the subscription is healthy, `503` otherwise.
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.health.is_healthy() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "UNHEALTHY")
    }
}

/// Detailed status as JSON. Always `200`; the body carries the verdict.
#[instrument(skip(state))]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = if state.health.is_healthy() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    Json(StatusResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        subscription_connected: state.health.is_connected(),
        consecutive_errors: state.health.consecutive_errors(),
        bundlers: state.aggregator.bundlers().len(),
    })
}
