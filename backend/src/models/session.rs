//! Models for driver sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::{DriverId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Lifecycle state. `Expired` and `Ended` are absorbing.
pub enum SessionState {
    Active,
    Expired,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Why a session was ended.
pub enum EndReason {
    /// The owning driver logged out.
    Logout,
    /// The driver logged in again from the same device.
    Replaced,
    /// An operator terminated the session.
    ForcedByAdmin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One "driver is on duty" authorization grant, bound to a device.
pub struct Session {
    pub id: SessionId,
    pub driver_id: DriverId,
    /// Device that authenticated; every report must come from it.
    pub device_id: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: SessionState,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<EndReason>,
}

impl Session {
    pub fn new(
        driver_id: DriverId,
        device_id: impl Into<String>,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            id: SessionId::new(),
            driver_id,
            device_id: device_id.into(),
            start_time: now,
            last_activity: now,
            expires_at: now + ttl,
            state: SessionState::Active,
            ended_at: None,
            end_reason: None,
        }
    }

    /// Expiry is inclusive: at exactly `expires_at` the session is over.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.state == SessionState::Expired || now >= self.expires_at
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && !self.is_expired_at(now)
    }

    /// Moment the session reached a terminal state, if it did.
    pub fn terminal_since(&self) -> Option<DateTime<Utc>> {
        match self.state {
            SessionState::Active => None,
            SessionState::Expired => Some(self.expires_at),
            SessionState::Ended => Some(self.ended_at.unwrap_or(self.last_activity)),
        }
    }

    /// Active sessions past their deadline flip to `Expired`. Returns true on change.
    pub fn mark_expired_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_active() && now >= self.expires_at {
            self.state = SessionState::Expired;
            return true;
        }
        false
    }

    /// Ends an active session. Terminal sessions are left untouched.
    pub fn end(&mut self, now: DateTime<Utc>, reason: EndReason) -> bool {
        if !self.is_active() {
            return false;
        }
        self.state = SessionState::Ended;
        self.ended_at = Some(now);
        self.end_reason = Some(reason);
        true
    }

    /// Records an accepted report; with a sliding window the deadline moves too.
    pub fn touch(&mut self, now: DateTime<Utc>, sliding_ttl: Option<chrono::Duration>) {
        self.last_activity = now;
        if let Some(ttl) = sliding_ttl {
            self.expires_at = now + ttl;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Public representation of a session.
pub struct SessionResponse {
    pub session_id: String,
    #[schema(value_type = String)]
    pub driver_id: DriverId,
    pub device_id: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl SessionResponse {
    pub fn from_session(session: &Session, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session.id.to_string(),
            driver_id: session.driver_id,
            device_id: session.device_id.clone(),
            start_time: session.start_time,
            last_activity: session.last_activity,
            expires_at: session.expires_at,
            is_active: session.is_valid_at(now),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload carrying only a session identifier.
pub struct SessionRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Aggregate view over active sessions, computed on demand.
pub struct SessionStats {
    pub total_active_sessions: usize,
    /// Mean of `lastActivity - startTime` across active sessions, in seconds.
    pub average_session_duration: i64,
    /// Start time of the oldest active session.
    pub oldest_session: Option<DateTime<Utc>>,
}
