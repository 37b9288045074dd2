//! Session lifecycle: validation, logout, operator termination and the
//! read-only aggregate views.

use chrono::{DateTime, Utc};
use std::{str::FromStr, sync::Arc};
use thiserror::Error;

use crate::{
    models::{EndReason, Session, SessionState, SessionStats},
    repositories::SessionStore,
    types::{DriverId, SessionId},
    utils::{security::session_fingerprint, time::Clock},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,
    #[error("Session expired")]
    Expired,
    #[error("Session does not belong to this driver")]
    DriverMismatch,
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NotFound => "SESSION_NOT_FOUND",
            SessionError::Expired => "SESSION_EXPIRED",
            SessionError::DriverMismatch => "SESSION_DRIVER_MISMATCH",
        }
    }
}

/// Unknown or malformed ids cannot name a stored session.
pub fn parse_session_id(raw: &str) -> Result<SessionId, SessionError> {
    SessionId::from_str(raw).map_err(|_| SessionError::NotFound)
}

/// Checks, in order: ended, expired, owner. `driver_id` of `None` skips the owner check.
pub fn authorize(
    session: &Session,
    driver_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), SessionError> {
    match session.state {
        SessionState::Ended => return Err(SessionError::NotFound),
        SessionState::Expired => return Err(SessionError::Expired),
        SessionState::Active if session.is_expired_at(now) => return Err(SessionError::Expired),
        SessionState::Active => {}
    }
    if let Some(raw) = driver_id {
        match DriverId::from_str(raw) {
            Ok(id) if id == session.driver_id => {}
            _ => return Err(SessionError::DriverMismatch),
        }
    }
    Ok(())
}

pub struct SessionService {
    store: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
}

impl SessionService {
    pub fn new(store: Arc<SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Returns the session if it exists, is active and has not expired.
    pub fn validate(&self, session_id: &str) -> Result<Session, SessionError> {
        self.authorize(session_id, None)
    }

    pub fn is_valid(&self, session_id: &SessionId) -> bool {
        self.store.is_valid(session_id, self.now())
    }

    pub fn authorize(
        &self,
        session_id: &str,
        driver_id: Option<&str>,
    ) -> Result<Session, SessionError> {
        let id = parse_session_id(session_id)?;
        let now = self.now();
        let session = self.store.get(&id, now).ok_or(SessionError::NotFound)?;
        authorize(&session, driver_id, now)?;
        Ok(session)
    }

    /// Driver-initiated logout. Ending an already terminal session is a no-op.
    pub fn end(&self, session_id: &str) -> Result<bool, SessionError> {
        self.terminate(session_id, EndReason::Logout)
    }

    /// Operator termination; same state change as [`Self::end`], logged distinctly.
    pub fn force_end(&self, session_id: &str) -> Result<bool, SessionError> {
        self.terminate(session_id, EndReason::ForcedByAdmin)
    }

    fn terminate(&self, session_id: &str, reason: EndReason) -> Result<bool, SessionError> {
        let id = parse_session_id(session_id)?;
        let changed = self
            .store
            .end(&id, self.now(), reason)
            .ok_or(SessionError::NotFound)?;
        let actor = match reason {
            EndReason::ForcedByAdmin => "admin",
            _ => "driver",
        };
        tracing::info!(
            session = %session_fingerprint(&id),
            actor,
            reason = ?reason,
            changed,
            "Session ended"
        );
        Ok(changed)
    }

    pub fn has_valid_session(&self, driver_id: &DriverId) -> bool {
        let now = self.now();
        self.store
            .current_for_driver(driver_id, now)
            .map(|session| session.is_valid_at(now))
            .unwrap_or(false)
    }

    pub fn active_sessions(&self) -> Vec<Session> {
        self.store.active(self.now())
    }

    pub fn active_count(&self) -> usize {
        self.store.active_count(self.now())
    }

    pub fn stats(&self) -> SessionStats {
        self.store.stats(self.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::ManualClock;
    use chrono::Duration;

    fn service() -> (SessionService, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let service = SessionService::new(Arc::new(SessionStore::new()), Arc::new(clock.clone()));
        (service, clock)
    }

    fn issue(service: &SessionService, driver: DriverId) -> Session {
        service
            .store()
            .issue(driver, "dev-A", service.now(), Duration::hours(24))
            .expect("issue")
            .session
    }

    #[test]
    fn validate_reports_expiry_at_the_boundary() {
        let (service, clock) = service();
        let session = issue(&service, DriverId::new());
        let id = session.id.to_string();

        clock.advance(Duration::hours(24) - Duration::seconds(1));
        assert!(service.validate(&id).is_ok());
        clock.advance(Duration::seconds(1));
        assert_eq!(service.validate(&id).unwrap_err(), SessionError::Expired);
    }

    #[test]
    fn end_is_idempotent_and_ended_sessions_read_as_not_found() {
        let (service, _clock) = service();
        let session = issue(&service, DriverId::new());
        let id = session.id.to_string();

        assert_eq!(service.end(&id), Ok(true));
        assert_eq!(service.end(&id), Ok(false));
        assert_eq!(service.force_end(&id), Ok(false));
        assert_eq!(service.validate(&id).unwrap_err(), SessionError::NotFound);
        assert_eq!(service.end("not-a-session"), Err(SessionError::NotFound));
    }

    #[test]
    fn authorize_checks_owner_after_state() {
        let (service, _clock) = service();
        let driver = DriverId::new();
        let session = issue(&service, driver);
        let id = session.id.to_string();

        assert!(service.authorize(&id, Some(&driver.to_string())).is_ok());
        assert_eq!(
            service
                .authorize(&id, Some(&DriverId::new().to_string()))
                .unwrap_err(),
            SessionError::DriverMismatch
        );
        assert_eq!(
            service.authorize(&id, Some("garbage")).unwrap_err(),
            SessionError::DriverMismatch
        );
    }

    #[test]
    fn presence_fact_tracks_current_session() {
        let (service, clock) = service();
        let driver = DriverId::new();
        assert!(!service.has_valid_session(&driver));
        issue(&service, driver);
        assert!(service.has_valid_session(&driver));
        assert_eq!(service.active_count(), 1);
        clock.advance(Duration::hours(24));
        assert!(!service.has_valid_session(&driver));
        assert_eq!(service.active_count(), 0);
    }
}
