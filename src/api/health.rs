use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use super::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.health.check_health().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

/// GET /health/live
pub async fn live() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}
