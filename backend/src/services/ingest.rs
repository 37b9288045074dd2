//! Location ingestion gate: every report must ride on a live, device-matched
//! session before it reaches the store or the broadcast queue.

use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::{
    gateway::{BroadcastEvent, Broadcaster},
    models::{LiveBus, LocationReport, LocationUpdateRequest},
    repositories::{DriverRepository, LocationStore, RecordOutcome, SessionStore},
    services::session::{authorize, parse_session_id, SessionError},
    utils::{security::session_fingerprint, time::Clock},
};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Device does not match the session")]
    DeviceMismatch,
    #[error("Invalid location report")]
    Validation(#[from] ValidationErrors),
    #[error("Report is for a bus other than the assigned {assigned}")]
    BusMismatch { assigned: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct Accepted {
    pub bus: LiveBus,
    /// Same sample as the stored latest; nothing was rebroadcast.
    pub duplicate: bool,
}

pub struct LocationIngestionGate {
    drivers: Arc<dyn DriverRepository>,
    sessions: Arc<SessionStore>,
    locations: Arc<LocationStore>,
    broadcaster: Broadcaster,
    clock: Arc<dyn Clock>,
    sliding_ttl: Option<Duration>,
}

impl LocationIngestionGate {
    pub fn new(
        drivers: Arc<dyn DriverRepository>,
        sessions: Arc<SessionStore>,
        locations: Arc<LocationStore>,
        broadcaster: Broadcaster,
        clock: Arc<dyn Clock>,
        sliding_ttl: Option<Duration>,
    ) -> Self {
        Self {
            drivers,
            sessions,
            locations,
            broadcaster,
            clock,
            sliding_ttl,
        }
    }

    /// Rejections are checked in order: unknown session, expired session,
    /// foreign driver, foreign device, then payload validation.
    pub async fn ingest(&self, request: LocationUpdateRequest) -> Result<Accepted, IngestError> {
        let session_id = parse_session_id(&request.session_id)?;
        let now = self.clock.now();

        let session = self
            .sessions
            .get(&session_id, now)
            .ok_or(SessionError::NotFound)?;
        authorize(&session, Some(&request.driver_id), now)?;

        if let Some(device_id) = request.device_id.as_deref() {
            if device_id != session.device_id {
                tracing::warn!(
                    session = %session_fingerprint(&session_id),
                    driver_id = %session.driver_id,
                    "Location rejected: device mismatch"
                );
                return Err(IngestError::DeviceMismatch);
            }
        }

        let report = LocationReport {
            driver_id: session.driver_id,
            bus_id: request.bus_id,
            route_id: request.route_id,
            latitude: request.latitude,
            longitude: request.longitude,
            heading: request.heading,
            speed: request.speed,
            accuracy: request.accuracy,
            status: request.status,
            timestamp: request.timestamp.unwrap_or(now),
            session_id,
        };
        report.validate()?;

        let driver = self
            .drivers
            .find_by_id(session.driver_id)
            .await?
            .ok_or(SessionError::DriverMismatch)?;
        if let Some(assigned) = driver.bus_id.as_ref() {
            if *assigned != report.bus_id {
                return Err(IngestError::BusMismatch {
                    assigned: assigned.clone(),
                });
            }
        }

        let bus = LiveBus::from_report(&report, now, true);
        let outcome = self.locations.record(report.clone(), now);

        let sliding_ttl = self.sliding_ttl;
        self.sessions.with_session(&session_id, now, |session| {
            if session.is_active() {
                session.touch(now, sliding_ttl);
            }
        });

        let duplicate = outcome == RecordOutcome::Duplicate;
        if !duplicate {
            self.drivers
                .record_seen(report.driver_id, report.timestamp)
                .await?;
            self.broadcaster
                .publish(BroadcastEvent::Location(bus.clone()));
        }

        tracing::debug!(
            session = %session_fingerprint(&session_id),
            bus_id = %bus.bus_id,
            duplicate,
            "Location accepted"
        );

        Ok(Accepted { bus, duplicate })
    }
}
