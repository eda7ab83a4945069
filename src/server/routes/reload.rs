//! POST /api/reload
//!
//! Re-reads the dashboard files and tells every open session to reload.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::live::LiveEvent;
use crate::server::dto::ReloadResponse;
use crate::server::error::ApiResult;
use crate::server::state::AppState;

pub async fn reload(State(state): State<Arc<AppState>>) -> ApiResult<Json<ReloadResponse>> {
    let config = state.dashboard.reload().await?;
    let delivered = state.hub.publish(LiveEvent::Reload).await;

    tracing::info!(title = %config.title, sessions = delivered, "Dashboard configuration reloaded");

    Ok(Json(ReloadResponse {
        title: config.title.clone(),
        theme: config.theme.clone(),
        delivered,
    }))
}
