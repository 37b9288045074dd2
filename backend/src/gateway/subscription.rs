//! Geographic subscriptions per connected observer.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{gateway::error::GatewayError, types::ClientId};

pub const MAX_AREA_LEN: usize = 64;
pub const MAX_SUBSCRIPTIONS_PER_CLIENT: usize = 32;

/// Latitude/longitude box. `west > east` means the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    pub fn validate(&self) -> Result<(), GatewayError> {
        let lat_ok = |v: f64| v.is_finite() && (-90.0..=90.0).contains(&v);
        let lon_ok = |v: f64| v.is_finite() && (-180.0..=180.0).contains(&v);
        if !lat_ok(self.north) || !lat_ok(self.south) {
            return Err(GatewayError::InvalidBounds(
                "latitude must be within [-90, 90]".into(),
            ));
        }
        if !lon_ok(self.east) || !lon_ok(self.west) {
            return Err(GatewayError::InvalidBounds(
                "longitude must be within [-180, 180]".into(),
            ));
        }
        if self.south > self.north {
            return Err(GatewayError::InvalidBounds(
                "south must not exceed north".into(),
            ));
        }
        Ok(())
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        if latitude < self.south || latitude > self.north {
            return false;
        }
        if self.west <= self.east {
            longitude >= self.west && longitude <= self.east
        } else {
            longitude >= self.west || longitude <= self.east
        }
    }
}

pub fn validate_area(area: &str) -> Result<(), GatewayError> {
    let area = area.trim();
    if area.is_empty() || area.len() > MAX_AREA_LEN {
        return Err(GatewayError::InvalidArea(format!(
            "area must be 1-{} characters",
            MAX_AREA_LEN
        )));
    }
    Ok(())
}

/// Client id → (area label → bounds). Lives only as long as the connection.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    by_client: DashMap<ClientId, HashMap<String, Bounds>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the client's subscription for `area`.
    pub fn subscribe(
        &self,
        client_id: ClientId,
        area: &str,
        bounds: Bounds,
    ) -> Result<(), GatewayError> {
        validate_area(area)?;
        bounds.validate()?;
        let mut areas = self.by_client.entry(client_id).or_default();
        if !areas.contains_key(area) && areas.len() >= MAX_SUBSCRIPTIONS_PER_CLIENT {
            return Err(GatewayError::TooManySubscriptions(MAX_SUBSCRIPTIONS_PER_CLIENT));
        }
        areas.insert(area.to_string(), bounds);
        Ok(())
    }

    /// Returns whether the area was subscribed.
    pub fn unsubscribe(&self, client_id: &ClientId, area: &str) -> bool {
        let Some(mut areas) = self.by_client.get_mut(client_id) else {
            return false;
        };
        areas.remove(area).is_some()
    }

    pub fn remove_client(&self, client_id: &ClientId) -> usize {
        self.by_client
            .remove(client_id)
            .map(|(_, areas)| areas.len())
            .unwrap_or(0)
    }

    /// Clients with at least one area containing the point.
    pub fn matching(&self, latitude: f64, longitude: f64) -> Vec<ClientId> {
        self.by_client
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .values()
                    .any(|bounds| bounds.contains(latitude, longitude))
            })
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.by_client.iter().map(|entry| entry.value().len()).sum()
    }
}
