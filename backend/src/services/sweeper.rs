use chrono::Duration;
use std::sync::Arc;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{
    repositories::{SessionStore, SweepReport},
    utils::time::Clock,
};

/// One sweep pass; logs only when something changed.
pub fn sweep_once(store: &SessionStore, clock: &dyn Clock, retention: Duration) -> SweepReport {
    let report = store.sweep(clock.now(), retention);
    if report.expired > 0 || report.removed > 0 {
        tracing::info!(
            expired = report.expired,
            removed = report.removed,
            remaining = store.len(),
            "Session sweep completed"
        );
    }
    report
}

/// Periodically expires overdue sessions and drops old terminal records.
pub fn spawn_session_sweeper(
    store: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    period: std::time::Duration,
    retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_once(&store, clock.as_ref(), retention);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{types::DriverId, utils::time::ManualClock};
    use chrono::Utc;

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_expires_and_removes_on_schedule() {
        let clock = ManualClock::new(Utc::now());
        let store = Arc::new(SessionStore::new());
        store
            .issue(DriverId::new(), "dev-A", clock.now(), Duration::hours(1))
            .expect("issue");

        let handle = spawn_session_sweeper(
            store.clone(),
            Arc::new(clock.clone()),
            std::time::Duration::from_secs(60),
            Duration::minutes(30),
        );

        clock.advance(Duration::hours(2));
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        assert!(store.is_empty());
        handle.abort();
    }

    #[test]
    fn sweep_once_reports_counts() {
        let clock = ManualClock::new(Utc::now());
        let store = SessionStore::new();
        store
            .issue(DriverId::new(), "dev-A", clock.now(), Duration::hours(1))
            .expect("issue");
        clock.advance(Duration::hours(1));
        let report = sweep_once(&store, &clock, Duration::minutes(30));
        assert_eq!(report.expired, 1);
        assert_eq!(report.removed, 0);
    }
}
