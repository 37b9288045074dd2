use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::{collections::VecDeque, sync::Mutex};
use utoipa::ToSchema;

/// Tracing target every audit event is emitted on.
pub const AUDIT_TARGET: &str = "audit";
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<String>,
    /// `admin` or `driver`.
    pub actor_type: String,
    pub event_type: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub result: String,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
}

#[async_trait]
pub trait AuditLogServiceTrait: Send + Sync {
    async fn record_event(&self, entry: AuditLogEntry) -> anyhow::Result<()>;
    /// Newest first.
    async fn recent(&self, limit: usize) -> anyhow::Result<Vec<AuditLogEntry>>;
}

/// Emits on the `audit` target and keeps a bounded in-memory ring.
#[derive(Debug)]
pub struct AuditLogService {
    entries: Mutex<VecDeque<AuditLogEntry>>,
    capacity: usize,
}

impl AuditLogService {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_AUDIT_CAPACITY))),
            capacity,
        }
    }
}

impl Default for AuditLogService {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

#[async_trait]
impl AuditLogServiceTrait for AuditLogService {
    async fn record_event(&self, entry: AuditLogEntry) -> anyhow::Result<()> {
        tracing::info!(
            target: AUDIT_TARGET,
            actor_type = %entry.actor_type,
            actor_id = entry.actor_id.as_deref().unwrap_or("-"),
            event_type = %entry.event_type,
            target_type = entry.target_type.as_deref().unwrap_or("-"),
            target_id = entry.target_id.as_deref().unwrap_or("-"),
            result = %entry.result,
            request_id = entry.request_id.as_deref().unwrap_or("-"),
            "audit event"
        );

        if self.capacity == 0 {
            return Ok(());
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("audit log lock poisoned"))?;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> anyhow::Result<Vec<AuditLogEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("audit log lock poisoned"))?;
        Ok(entries.iter().rev().take(limit).cloned().collect())
    }
}
