use axum::{
    extract::{Extension, Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use std::{str::FromStr, sync::Arc};

use crate::{
    error::AppError,
    gateway::{BroadcastEvent, DriverStatusEvent},
    handlers::audit::{record_session_audit_event, SessionActor, SessionAuditEvent},
    middleware::request_id::RequestId,
    models::{
        DriverLoginRequest, DriverLoginResponse, DriverPresenceResponse, DriverStatusRequest,
        LocationUpdateRequest, SessionRequest, SessionResponse,
    },
    services::{audit_log::AuditLogServiceTrait, auth::LoginHandle, session::parse_session_id},
    state::AppState,
    types::DriverId,
    utils::security::session_fingerprint,
    validation::validate_payload,
};

const DEVICE_ID_HEADER: &str = "x-device-id";

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<DriverLoginRequest>,
) -> Result<Json<DriverLoginResponse>, AppError> {
    validate_payload(&payload)?;

    let phone = payload.phone.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let email = payload.email.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let handle = match (phone, email) {
        (Some(phone), _) => LoginHandle::Phone(phone),
        (None, Some(email)) => LoginHandle::Email(email),
        (None, None) => {
            return Err(AppError::Validation(vec![
                "phone: phone or email is required".to_string(),
            ]))
        }
    };

    let authenticated = state
        .authenticator
        .authenticate(handle, payload.device_id.trim())
        .await?;
    let session = authenticated.session;

    Ok(Json(DriverLoginResponse {
        success: true,
        driver_id: authenticated.driver.driver_id,
        session_id: session.id.to_string(),
        bus_id: authenticated.driver.bus_id,
        route_id: authenticated.driver.route_id,
        session_start_time: session.start_time,
        session_expires_at: session.expires_at,
    }))
}

pub async fn update_location(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut payload): Json<LocationUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    if payload.device_id.is_none() {
        payload.device_id = headers
            .get(DEVICE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
    }

    state.ingest.ingest(payload).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn validate_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> Result<Json<Value>, AppError> {
    let session = state.sessions.validate(&payload.session_id)?;
    let data = SessionResponse::from_session(&session, state.sessions.now());
    Ok(Json(json!({ "success": true, "data": data })))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(audit_log_service): Extension<Arc<dyn AuditLogServiceTrait>>,
    Extension(request_id): Extension<RequestId>,
    headers: HeaderMap,
    Json(payload): Json<SessionRequest>,
) -> Result<Json<Value>, AppError> {
    let session_id = parse_session_id(&payload.session_id)?;
    let changed = state.sessions.end(&payload.session_id)?;

    if changed {
        if let Some(session) = state.sessions.store().get(&session_id, state.sessions.now()) {
            let driver_id = session.driver_id.to_string();
            record_session_audit_event(
                audit_log_service,
                &headers,
                Some(&request_id),
                SessionAuditEvent {
                    actor: SessionActor::Driver(&driver_id),
                    event_type: "session_end",
                    session: session_fingerprint(&session.id),
                    metadata: Some(json!({ "reason": "logout" })),
                    occurred_at: state.clock.now(),
                },
            );
        }
    }

    Ok(Json(json!({ "success": true })))
}

pub async fn update_status(
    State(state): State<AppState>,
    Json(payload): Json<DriverStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let session = state
        .sessions
        .authorize(&payload.session_id, Some(&payload.driver_id))?;

    let driver = state
        .drivers
        .set_status(session.driver_id, payload.status)
        .await?
        .ok_or_else(|| AppError::NotFound("Driver not found".into()))?;

    let event = DriverStatusEvent {
        driver_id: driver.driver_id,
        bus_id: driver.bus_id.clone(),
        route_id: driver.route_id.clone(),
        status: driver.status,
        changed_at: state.clock.now(),
    };
    state.broadcaster.publish(BroadcastEvent::DriverStatus(event));
    tracing::info!(
        driver_id = %driver.driver_id,
        status = driver.status.as_str(),
        "Driver status changed"
    );

    Ok(Json(json!({ "success": true, "status": driver.status })))
}

pub async fn presence(
    State(state): State<AppState>,
    Path(driver_id): Path<String>,
) -> Result<Json<DriverPresenceResponse>, AppError> {
    let driver_id = DriverId::from_str(&driver_id)
        .map_err(|_| AppError::BadRequest("Invalid driver ID".into()))?;
    let driver = state
        .drivers
        .find_by_id(driver_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Driver not found".into()))?;

    let now = state.clock.now();
    Ok(Json(DriverPresenceResponse {
        driver_id: driver.driver_id,
        is_online: driver.is_online(),
        status: driver.status,
        has_valid_session: state.sessions.has_valid_session(&driver.driver_id),
        seen_recently: driver.seen_within(now, state.config.online_threshold()),
        last_seen: driver.last_seen,
    }))
}
