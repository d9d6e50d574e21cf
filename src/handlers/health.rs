//! Liveness and dependency health

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use crate::state::AppState;

pub async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let health = state.services.health_check().await;
    let status = if health.is_healthy() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (status, Json(json!({
        "status": if health.is_healthy() { "ok" } else { "degraded" },
        "version": crate::VERSION,
        "services": health,
        "issues": health.get_issues(),
    })))
}
