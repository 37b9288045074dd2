use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::{
    error::AppError,
    services::audit_log::{AuditLogEntry, AuditLogServiceTrait},
};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 1_000;

#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditLogListQuery {
    pub limit: Option<usize>,
}

pub async fn list_audit_logs(
    Extension(audit_log_service): Extension<Arc<dyn AuditLogServiceTrait>>,
    Query(query): Query<AuditLogListQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let entries = audit_log_service.recent(limit).await?;
    Ok(Json(entries))
}
