use axum::{
    extract::{Extension, Path, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    handlers::audit::{record_session_audit_event, SessionActor, SessionAuditEvent},
    middleware::{auth::AdminActor, request_id::RequestId},
    models::{SessionResponse, SessionStats},
    services::{
        audit_log::AuditLogServiceTrait,
        session::{parse_session_id, SessionError},
    },
    state::AppState,
    utils::security::session_fingerprint,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminSessionListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<SessionResponse>,
}

pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<AdminSessionListResponse>, AppError> {
    let now = state.sessions.now();
    let data: Vec<SessionResponse> = state
        .sessions
        .active_sessions()
        .iter()
        .map(|session| SessionResponse::from_session(session, now))
        .collect();
    Ok(Json(AdminSessionListResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

pub async fn session_stats(State(state): State<AppState>) -> Json<SessionStats> {
    Json(state.sessions.stats())
}

pub async fn force_end_session(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminActor>,
    Extension(request_id): Extension<RequestId>,
    Extension(audit_log_service): Extension<Arc<dyn AuditLogServiceTrait>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if session_id.trim().is_empty() {
        return Err(AppError::BadRequest("Session ID is required".into()));
    }
    let id = parse_session_id(session_id.trim())
        .map_err(|_| AppError::NotFound("Session not found".into()))?;

    let ended = state
        .sessions
        .force_end(session_id.trim())
        .map_err(|err| match err {
            SessionError::NotFound => AppError::NotFound("Session not found".into()),
            other => AppError::Session(other),
        })?;

    if ended {
        record_session_audit_event(
            audit_log_service,
            &headers,
            Some(&request_id),
            SessionAuditEvent {
                actor: SessionActor::Admin(&admin.token_fingerprint),
                event_type: "session_force_end",
                session: session_fingerprint(&id),
                metadata: Some(json!({ "reason": "forced_by_admin" })),
                occurred_at: state.clock.now(),
            },
        );
    }

    Ok(Json(json!({ "success": true, "ended": ended })))
}
