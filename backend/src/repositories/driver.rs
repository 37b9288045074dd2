//! Driver directory: lookup by id and by login handle.

use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::path::Path;

use crate::{
    models::{Driver, DriverSeed, DriverStatus},
    types::DriverId,
    validation::rules,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DriverRepository: Send + Sync {
    async fn find_by_id(&self, id: DriverId) -> anyhow::Result<Option<Driver>>;
    async fn find_by_phone(&self, phone: &str) -> anyhow::Result<Option<Driver>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Driver>>;
    async fn insert(&self, driver: Driver) -> anyhow::Result<Driver>;
    async fn assign_vehicle(
        &self,
        id: DriverId,
        bus_id: String,
        route_id: String,
    ) -> anyhow::Result<Option<Driver>>;
    async fn set_status(&self, id: DriverId, status: DriverStatus)
        -> anyhow::Result<Option<Driver>>;
    async fn record_seen(&self, id: DriverId, at: DateTime<Utc>) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryDriverRepository {
    drivers: DashMap<DriverId, Driver>,
    by_phone: DashMap<String, DriverId>,
    by_email: DashMap<String, DriverId>,
}

impl InMemoryDriverRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the directory from a JSON array of [`DriverSeed`] entries.
    pub fn from_seed_file(path: &Path, now: DateTime<Utc>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read drivers file {}", path.display()))?;
        let seeds: Vec<DriverSeed> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid drivers file {}", path.display()))?;
        Self::from_seeds(seeds, now)
    }

    pub fn from_seeds(seeds: Vec<DriverSeed>, now: DateTime<Utc>) -> anyhow::Result<Self> {
        let repo = Self::new();
        for seed in seeds {
            repo.insert_driver(Driver::from_seed(seed, now))?;
        }
        Ok(repo)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    fn insert_driver(&self, driver: Driver) -> anyhow::Result<Driver> {
        if driver.phone.is_empty() {
            bail!("Driver {} has no phone number", driver.driver_id);
        }
        if self.drivers.contains_key(&driver.driver_id) {
            bail!("Duplicate driver id {}", driver.driver_id);
        }
        if self.by_phone.contains_key(&driver.phone) {
            bail!("Duplicate driver phone {}", driver.phone);
        }
        if let Some(email) = driver.email.as_ref() {
            if self.by_email.contains_key(email) {
                bail!("Duplicate driver email {}", email);
            }
            self.by_email.insert(email.clone(), driver.driver_id);
        }
        self.by_phone.insert(driver.phone.clone(), driver.driver_id);
        self.drivers.insert(driver.driver_id, driver.clone());
        Ok(driver)
    }

    fn update<F>(&self, id: DriverId, apply: F) -> Option<Driver>
    where
        F: FnOnce(&mut Driver),
    {
        let mut entry = self.drivers.get_mut(&id)?;
        apply(entry.value_mut());
        Some(entry.value().clone())
    }
}

#[async_trait]
impl DriverRepository for InMemoryDriverRepository {
    async fn find_by_id(&self, id: DriverId) -> anyhow::Result<Option<Driver>> {
        Ok(self.drivers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_phone(&self, phone: &str) -> anyhow::Result<Option<Driver>> {
        let phone = rules::normalize_phone(phone);
        let Some(id) = self.by_phone.get(&phone).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Driver>> {
        let email = email.trim().to_ascii_lowercase();
        let Some(id) = self.by_email.get(&email).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn insert(&self, driver: Driver) -> anyhow::Result<Driver> {
        self.insert_driver(driver)
    }

    async fn assign_vehicle(
        &self,
        id: DriverId,
        bus_id: String,
        route_id: String,
    ) -> anyhow::Result<Option<Driver>> {
        Ok(self.update(id, |driver| {
            driver.bus_id = Some(bus_id);
            driver.route_id = Some(route_id);
        }))
    }

    async fn set_status(
        &self,
        id: DriverId,
        status: DriverStatus,
    ) -> anyhow::Result<Option<Driver>> {
        Ok(self.update(id, |driver| driver.status = status))
    }

    async fn record_seen(&self, id: DriverId, at: DateTime<Utc>) -> anyhow::Result<()> {
        self.update(id, |driver| driver.last_seen = Some(at));
        Ok(())
    }
}
