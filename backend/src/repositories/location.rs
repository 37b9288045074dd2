use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::collections::VecDeque;

use crate::{
    models::{LiveBus, LocationReport},
    types::SessionId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Stored,
    /// Same session re-sent the sample already stored as latest.
    Duplicate,
}

#[derive(Debug, Clone)]
struct BusTrack {
    latest: LocationReport,
    received_at: DateTime<Utc>,
    history: VecDeque<LocationReport>,
}

/// Latest report per bus, plus a bounded trail. Last write wins by arrival order.
#[derive(Debug)]
pub struct LocationStore {
    buses: DashMap<String, BusTrack>,
    history_limit: usize,
}

impl LocationStore {
    pub fn new(history_limit: usize) -> Self {
        Self {
            buses: DashMap::new(),
            history_limit,
        }
    }

    pub fn record(&self, report: LocationReport, received_at: DateTime<Utc>) -> RecordOutcome {
        let mut track = match self.buses.entry(report.bus_id.clone()) {
            Entry::Occupied(track) => track,
            Entry::Vacant(slot) => {
                let mut history = VecDeque::new();
                if self.history_limit > 0 {
                    history.push_back(report.clone());
                }
                slot.insert(BusTrack {
                    latest: report,
                    received_at,
                    history,
                });
                return RecordOutcome::Stored;
            }
        };
        let track = track.get_mut();

        if track.latest.session_id == report.session_id
            && track.latest.timestamp == report.timestamp
        {
            return RecordOutcome::Duplicate;
        }

        if self.history_limit > 0 {
            if track.history.len() >= self.history_limit {
                track.history.pop_front();
            }
            track.history.push_back(report.clone());
        }
        track.latest = report;
        track.received_at = received_at;
        RecordOutcome::Stored
    }

    pub fn latest(&self, bus_id: &str) -> Option<LocationReport> {
        self.buses.get(bus_id).map(|track| track.latest.clone())
    }

    /// Oldest first. `None` for a bus that never reported.
    pub fn history(&self, bus_id: &str) -> Option<Vec<LocationReport>> {
        self.buses
            .get(bus_id)
            .map(|track| track.history.iter().cloned().collect())
    }

    /// Snapshot of every bus, sorted by bus id. `is_active` decides whether the
    /// session behind each latest report is still valid.
    pub fn live(&self, is_active: impl Fn(&SessionId) -> bool) -> Vec<LiveBus> {
        let mut buses: Vec<LiveBus> = self
            .buses
            .iter()
            .map(|track| {
                LiveBus::from_report(
                    &track.latest,
                    track.received_at,
                    is_active(&track.latest.session_id),
                )
            })
            .collect();
        buses.sort_by(|a, b| a.bus_id.cmp(&b.bus_id));
        buses
    }

    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }
}
