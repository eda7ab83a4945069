//! GET /api/config

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::schema::HerbstConfig;
use crate::server::state::AppState;

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<HerbstConfig> {
    let config = state.dashboard.current().await;
    Json(HerbstConfig::clone(&config))
}
