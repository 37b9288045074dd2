use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub clients: usize,
    pub subscriptions: usize,
    pub active_sessions: usize,
    /// Buses with at least one accepted report.
    pub buses: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.gateway.is_shutting_down() {
        "shutting_down"
    } else {
        "ok"
    };
    Json(HealthResponse {
        status: status.to_string(),
        clients: state.gateway.clients.client_count(),
        subscriptions: state.gateway.subscriptions.count(),
        active_sessions: state.sessions.active_count(),
        buses: state.locations.len(),
    })
}
