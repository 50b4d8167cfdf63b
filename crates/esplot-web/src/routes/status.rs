//! Hub status route handler.

use axum::{extract::State, http::StatusCode, Json};
use esplot_core::HubStats;

use crate::state::AppState;

/// GET /status - Current hub counters.
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<HubStats>, (StatusCode, String)> {
    let stats = state
        .hub
        .stats()
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;

    Ok(Json(stats))
}
