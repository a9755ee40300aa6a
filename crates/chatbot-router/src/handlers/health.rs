use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    active_sessions: usize,
    classifier_enabled: bool,
}

/// Plain-text liveness probe
pub async fn root() -> (StatusCode, &'static str) {
    (StatusCode::OK, "Backend is running!")
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_sessions: state.router.conversations().session_count(),
            classifier_enabled: state.router.classifier_enabled(),
        }),
    )
}
