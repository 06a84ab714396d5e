//! Health check handlers.

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};

use crate::api::AppState;
use crate::services::HealthReport;

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/deep", get(deep_health))
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Process is up", body = HealthReport)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health_service.check().await)
}

/// Database and cache connectivity
#[utoipa::path(
    get,
    path = "/api/v1/health/deep",
    tag = "Health",
    responses(
        (status = 200, description = "All dependencies reachable", body = HealthReport),
        (status = 503, description = "At least one dependency is down", body = HealthReport)
    )
)]
pub async fn deep_health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health_service.deep_check().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
