use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::AppError,
    models::{LiveBus, LocationReport},
    state::AppState,
};

/// Latest position per bus; `isActive` reflects whether the reporting session is still valid.
pub async fn live_buses(State(state): State<AppState>) -> Json<Vec<LiveBus>> {
    let sessions = state.sessions.clone();
    Json(state.locations.live(|session_id| sessions.is_valid(session_id)))
}

pub async fn bus_history(
    State(state): State<AppState>,
    Path(bus_id): Path<String>,
) -> Result<Json<Vec<LocationReport>>, AppError> {
    state
        .locations
        .history(bus_id.trim())
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Bus not found".into()))
}
