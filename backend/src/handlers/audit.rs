use axum::http::{header::USER_AGENT, HeaderMap};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

use crate::{
    middleware::request_id::RequestId,
    services::audit_log::{AuditLogEntry, AuditLogServiceTrait},
};

/// Who terminated a session.
#[derive(Debug, Clone, Copy)]
pub enum SessionActor<'a> {
    Driver(&'a str),
    Admin(&'a str),
}

impl SessionActor<'_> {
    fn actor_type(&self) -> &'static str {
        match self {
            SessionActor::Driver(_) => "driver",
            SessionActor::Admin(_) => "admin",
        }
    }

    fn actor_id(&self) -> String {
        match self {
            SessionActor::Driver(id) | SessionActor::Admin(id) => id.to_string(),
        }
    }
}

pub struct SessionAuditEvent<'a> {
    pub actor: SessionActor<'a>,
    pub event_type: &'static str,
    /// Fingerprint of the session, never the raw identifier.
    pub session: String,
    pub metadata: Option<Value>,
    pub occurred_at: DateTime<Utc>,
}

/// Records the event off the request path; failures are logged, not surfaced.
pub fn record_session_audit_event(
    audit_log_service: Arc<dyn AuditLogServiceTrait>,
    headers: &HeaderMap,
    request_id: Option<&RequestId>,
    event: SessionAuditEvent<'_>,
) {
    let event_type = event.event_type;
    let entry = AuditLogEntry {
        occurred_at: event.occurred_at,
        actor_id: Some(event.actor.actor_id()),
        actor_type: event.actor.actor_type().to_string(),
        event_type: event_type.to_string(),
        target_type: Some("session".to_string()),
        target_id: Some(event.session),
        result: "success".to_string(),
        metadata: event.metadata,
        ip: extract_ip(headers),
        user_agent: extract_user_agent(headers),
        request_id: request_id.map(|id| id.0.clone()),
    };

    tokio::spawn(async move {
        if let Err(err) = audit_log_service.record_event(entry).await {
            tracing::warn!(
                error = ?err,
                event_type = %event_type,
                "Failed to record session audit log"
            );
        }
    });
}

fn extract_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        return value
            .split(',')
            .next()
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty());
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|agent| agent.trim().to_string())
        .filter(|agent| !agent.is_empty())
}
