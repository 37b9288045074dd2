//! Models that represent drivers, their duty status and login payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{types::DriverId, validation::rules};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Directory record of a vehicle operator.
pub struct Driver {
    /// Stable, server-assigned identifier.
    #[schema(value_type = String)]
    pub driver_id: DriverId,
    pub name: String,
    /// Normalised phone number used for login.
    pub phone: String,
    /// Optional alternative login handle.
    pub email: Option<String>,
    pub license_number: String,
    /// Bus currently assigned by an administrator.
    pub bus_id: Option<String>,
    /// Route currently assigned by an administrator.
    pub route_id: Option<String>,
    /// Explicit duty status. Only changed by status-update calls.
    pub status: DriverStatus,
    /// Timestamp of the last accepted location report.
    pub last_seen: Option<DateTime<Utc>>,
    /// Soft-delete marker; deactivated drivers cannot log in.
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Driver {
    pub fn from_seed(seed: DriverSeed, now: DateTime<Utc>) -> Self {
        Self {
            driver_id: seed.driver_id.unwrap_or_default(),
            name: seed.name,
            phone: rules::normalize_phone(&seed.phone),
            email: seed.email.map(|email| email.trim().to_ascii_lowercase()),
            license_number: seed.license_number,
            bus_id: seed.bus_id,
            route_id: seed.route_id,
            status: DriverStatus::Offline,
            last_seen: None,
            deactivated_at: seed.deactivated.then_some(now),
            created_at: now,
        }
    }

    pub fn is_deactivated(&self) -> bool {
        self.deactivated_at.is_some()
    }

    /// The explicit online flag. Independent of session validity.
    pub fn is_online(&self) -> bool {
        self.status != DriverStatus::Offline
    }

    /// Whether an accepted report arrived within `threshold` of `now`.
    pub fn seen_within(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        self.last_seen
            .map(|seen| now.signed_duration_since(seen) <= threshold)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
/// Duty status a driver toggles explicitly from the app.
pub enum DriverStatus {
    Online,
    Idle,
    #[default]
    Offline,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Online => "online",
            DriverStatus::Idle => "idle",
            DriverStatus::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Entry of the JSON file used to seed the driver directory.
pub struct DriverSeed {
    #[serde(default)]
    pub driver_id: Option<DriverId>,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub license_number: String,
    #[serde(default)]
    pub bus_id: Option<String>,
    #[serde(default)]
    pub route_id: Option<String>,
    #[serde(default)]
    pub deactivated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Credentials submitted by a driver app. Either `phone` or `email` is required.
pub struct DriverLoginRequest {
    #[validate(custom(function = "rules::validate_phone"))]
    #[serde(default)]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    #[serde(default)]
    pub email: Option<String>,
    #[validate(custom(function = "rules::validate_device_id"))]
    pub device_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Returned after a successful driver login.
pub struct DriverLoginResponse {
    pub success: bool,
    #[schema(value_type = String)]
    pub driver_id: DriverId,
    /// Opaque session identifier the app must send with every report.
    pub session_id: String,
    pub bus_id: Option<String>,
    pub route_id: Option<String>,
    pub session_start_time: DateTime<Utc>,
    pub session_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Explicit duty-status change requested by the driver app.
pub struct DriverStatusRequest {
    pub driver_id: String,
    pub session_id: String,
    pub status: DriverStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Independent presence facts for one driver.
pub struct DriverPresenceResponse {
    #[schema(value_type = String)]
    pub driver_id: DriverId,
    /// Explicit duty toggle.
    pub is_online: bool,
    pub status: DriverStatus,
    /// Whether an active, unexpired session exists.
    pub has_valid_session: bool,
    /// Whether a report was accepted within the online threshold.
    pub seen_recently: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Administrative bus/route reassignment.
pub struct AssignVehicleRequest {
    #[validate(length(min = 1, max = 64))]
    pub bus_id: String,
    #[validate(length(min = 1, max = 64))]
    pub route_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn driver() -> Driver {
        Driver::from_seed(
            DriverSeed {
                driver_id: None,
                name: "Ana".into(),
                phone: "+63 917 000 1111".into(),
                email: Some("Ana@Example.com".into()),
                license_number: "N01-23".into(),
                bus_id: Some("BUS-1".into()),
                route_id: Some("R-1".into()),
                deactivated: false,
            },
            Utc::now(),
        )
    }

    #[test]
    fn seeded_driver_starts_offline_with_normalized_handles() {
        let driver = driver();
        assert_eq!(driver.status, DriverStatus::Offline);
        assert!(!driver.is_online());
        assert_eq!(driver.phone, "+639170001111");
        assert_eq!(driver.email.as_deref(), Some("ana@example.com"));
    }

    #[test]
    fn seen_within_respects_threshold() {
        let mut driver = driver();
        let now = Utc::now();
        assert!(!driver.seen_within(now, Duration::minutes(5)));
        driver.last_seen = Some(now - Duration::minutes(4));
        assert!(driver.seen_within(now, Duration::minutes(5)));
        driver.last_seen = Some(now - Duration::minutes(6));
        assert!(!driver.seen_within(now, Duration::minutes(5)));
    }

    #[test]
    fn idle_counts_as_online() {
        let mut driver = driver();
        driver.status = DriverStatus::Idle;
        assert!(driver.is_online());
    }
}
