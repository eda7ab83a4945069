//! GET /health

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::server::dto::HealthResponse;
use crate::server::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.uptime_seconds(),
        subscribers: state.hub.subscriber_count(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
