//! In-memory session table indexed by session id and by driver.
//!
//! Lock order is always `by_driver` before `sessions`; nothing holds a
//! `sessions` guard while touching `by_driver`.

use chrono::{DateTime, Duration, Utc};
use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    models::{EndReason, Session, SessionStats},
    types::{DriverId, SessionId},
};

/// Returned when a driver still holds a live session bound to another device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConflict {
    pub session_id: SessionId,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: Session,
    /// Prior live session from the same device that this one replaced.
    pub replaced: Option<SessionId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub removed: usize,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Session>,
    by_driver: DashMap<DriverId, SessionId>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a session for `driver_id`, enforcing one live session per driver.
    ///
    /// The driver's index entry stays locked for the whole check-then-set.
    pub fn issue(
        &self,
        driver_id: DriverId,
        device_id: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<IssuedSession, DeviceConflict> {
        let session = Session::new(driver_id, device_id, now, ttl);
        let mut replaced = None;

        match self.by_driver.entry(driver_id) {
            Entry::Occupied(mut slot) => {
                let prior_id = *slot.get();
                // The prior guard must be released before inserting into the same map.
                if let Some(mut prior) = self.sessions.get_mut(&prior_id) {
                    prior.mark_expired_if_due(now);
                    if prior.is_active() {
                        if prior.device_id != device_id {
                            return Err(DeviceConflict {
                                session_id: prior_id,
                            });
                        }
                        prior.end(now, EndReason::Replaced);
                        replaced = Some(prior_id);
                    }
                }
                self.sessions.insert(session.id, session.clone());
                slot.insert(session.id);
            }
            Entry::Vacant(slot) => {
                self.sessions.insert(session.id, session.clone());
                slot.insert(session.id);
            }
        }

        Ok(IssuedSession { session, replaced })
    }

    /// Snapshot of a session, flipping it to `Expired` first if it is overdue.
    pub fn get(&self, id: &SessionId, now: DateTime<Utc>) -> Option<Session> {
        self.with_session(id, now, |session| session.clone())
    }

    /// Runs `f` under the session's write guard after lazy expiry detection.
    pub fn with_session<R>(
        &self,
        id: &SessionId,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        let mut entry = self.sessions.get_mut(id)?;
        entry.mark_expired_if_due(now);
        Some(f(entry.value_mut()))
    }

    /// `None` if unknown, otherwise whether this call changed the state.
    pub fn end(&self, id: &SessionId, now: DateTime<Utc>, reason: EndReason) -> Option<bool> {
        self.with_session(id, now, |session| session.end(now, reason))
    }

    /// Read-only validity check; does not flip state.
    pub fn is_valid(&self, id: &SessionId, now: DateTime<Utc>) -> bool {
        self.sessions
            .get(id)
            .map(|session| session.is_valid_at(now))
            .unwrap_or(false)
    }

    pub fn current_for_driver(&self, driver_id: &DriverId, now: DateTime<Utc>) -> Option<Session> {
        let session_id = self.by_driver.get(driver_id).map(|entry| *entry.value())?;
        self.get(&session_id, now)
    }

    pub fn active(&self, now: DateTime<Utc>) -> Vec<Session> {
        let mut active: Vec<Session> = self
            .sessions
            .iter_mut()
            .filter_map(|mut entry| {
                entry.mark_expired_if_due(now);
                entry.is_active().then(|| entry.value().clone())
            })
            .collect();
        active.sort_by_key(|session| session.start_time);
        active
    }

    pub fn active_count(&self, now: DateTime<Utc>) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.is_valid_at(now))
            .count()
    }

    pub fn stats(&self, now: DateTime<Utc>) -> SessionStats {
        let active = self.active(now);
        let total = active.len();
        let average_session_duration = if total == 0 {
            0
        } else {
            let sum: i64 = active
                .iter()
                .map(|session| (session.last_activity - session.start_time).num_seconds())
                .sum();
            sum / total as i64
        };

        SessionStats {
            total_active_sessions: total,
            average_session_duration,
            oldest_session: active.first().map(|session| session.start_time),
        }
    }

    /// Marks overdue sessions expired and drops terminal ones older than `retention`.
    pub fn sweep(&self, now: DateTime<Utc>, retention: Duration) -> SweepReport {
        let mut report = SweepReport::default();
        self.sessions.retain(|_, session| {
            if session.mark_expired_if_due(now) {
                report.expired += 1;
            }
            let keep = session
                .terminal_since()
                .map(|since| now - since < retention)
                .unwrap_or(true);
            if !keep {
                report.removed += 1;
            }
            keep
        });
        self.by_driver
            .retain(|_, session_id| self.sessions.contains_key(session_id));
        report
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
