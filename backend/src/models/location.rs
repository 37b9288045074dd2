//! GPS samples, their inbound payload, and the live snapshot shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{DriverId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Vehicle status carried by each report.
pub enum LocationStatus {
    Active,
    Idle,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// One accepted (or candidate) GPS sample.
pub struct LocationReport {
    #[schema(value_type = String)]
    pub driver_id: DriverId,
    #[validate(length(min = 1, max = 64))]
    pub bus_id: String,
    #[validate(length(min = 1, max = 64))]
    pub route_id: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(range(min = 0.0, exclusive_max = 360.0))]
    pub heading: f64,
    #[validate(range(min = 0.0))]
    pub speed: f64,
    #[validate(range(min = 0.0))]
    pub accuracy: f64,
    pub status: LocationStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing, default)]
    #[schema(value_type = String)]
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Body of `POST /api/driver/location`. Identifiers stay raw so malformed
/// values map onto the documented rejection reasons.
pub struct LocationUpdateRequest {
    pub driver_id: String,
    pub bus_id: String,
    pub route_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f64,
    pub speed: f64,
    pub accuracy: f64,
    pub status: LocationStatus,
    pub session_id: String,
    /// Device-reported sample time; defaults to the receive time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Optional device binding check, also accepted as `X-Device-Id`.
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LivePosition {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f64,
    pub speed: f64,
    pub accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Latest known state of one bus, as served by `GET /api/buses/live`.
pub struct LiveBus {
    pub bus_id: String,
    pub route_id: String,
    #[schema(value_type = String)]
    pub driver_id: DriverId,
    pub location: LivePosition,
    pub status: LocationStatus,
    /// Whether the session that produced the report is still valid.
    pub is_active: bool,
    /// Server time the report was accepted.
    pub last_update: DateTime<Utc>,
}

impl LiveBus {
    pub fn from_report(report: &LocationReport, received_at: DateTime<Utc>, is_active: bool) -> Self {
        Self {
            bus_id: report.bus_id.clone(),
            route_id: report.route_id.clone(),
            driver_id: report.driver_id,
            location: LivePosition {
                latitude: report.latitude,
                longitude: report.longitude,
                heading: report.heading,
                speed: report.speed,
                accuracy: report.accuracy,
                timestamp: report.timestamp,
            },
            status: report.status,
            is_active,
            last_update: received_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> LocationReport {
        LocationReport {
            driver_id: DriverId::new(),
            bus_id: "BUS-7".into(),
            route_id: "R-12".into(),
            latitude: 14.5995,
            longitude: 120.9842,
            heading: 90.0,
            speed: 8.5,
            accuracy: 5.0,
            status: LocationStatus::Active,
            timestamp: Utc::now(),
            session_id: SessionId::new(),
        }
    }

    #[test]
    fn valid_report_passes() {
        assert!(report().validate().is_ok());
    }

    #[test]
    fn heading_upper_bound_is_exclusive() {
        let mut r = report();
        r.heading = 359.99;
        assert!(r.validate().is_ok());
        r.heading = 360.0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let mut r = report();
        r.latitude = 90.5;
        let errors = r.validate().expect_err("latitude");
        assert!(errors.field_errors().contains_key("latitude"));

        let mut r = report();
        r.longitude = -181.0;
        assert!(r.validate().is_err());

        let mut r = report();
        r.speed = -0.1;
        assert!(r.validate().is_err());

        let mut r = report();
        r.accuracy = -1.0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn session_id_is_not_echoed_in_json() {
        let json = serde_json::to_value(report()).expect("serialize");
        assert!(json.get("sessionId").is_none());
        assert_eq!(json["busId"], "BUS-7");
    }
}
