use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    models::{Driver, Session},
    repositories::{DriverRepository, SessionStore},
    types::SessionId,
    utils::{security::session_fingerprint, time::Clock},
};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Driver already has an active session on another device")]
    DeviceMismatch,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::DeviceMismatch => "DEVICE_MISMATCH",
            AuthError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Login handle submitted by the driver app.
#[derive(Debug, Clone, Copy)]
pub enum LoginHandle<'a> {
    Phone(&'a str),
    Email(&'a str),
}

#[derive(Debug, Clone)]
pub struct Authenticated {
    pub driver: Driver,
    pub session: Session,
    pub replaced: Option<SessionId>,
}

pub struct DriverAuthenticator {
    drivers: Arc<dyn DriverRepository>,
    sessions: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl DriverAuthenticator {
    pub fn new(
        drivers: Arc<dyn DriverRepository>,
        sessions: Arc<SessionStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            drivers,
            sessions,
            clock,
            ttl,
        }
    }

    /// Looks up the driver and issues a device-bound session.
    ///
    /// A live session from another device refuses the login; one from the same
    /// device is ended and replaced.
    pub async fn authenticate(
        &self,
        handle: LoginHandle<'_>,
        device_id: &str,
    ) -> Result<Authenticated, AuthError> {
        let driver = match handle {
            LoginHandle::Phone(phone) => self.drivers.find_by_phone(phone).await?,
            LoginHandle::Email(email) => self.drivers.find_by_email(email).await?,
        };
        let driver = match driver {
            Some(driver) if !driver.is_deactivated() => driver,
            _ => return Err(AuthError::InvalidCredentials),
        };

        let issued = self
            .sessions
            .issue(driver.driver_id, device_id, self.clock.now(), self.ttl)
            .map_err(|conflict| {
                tracing::warn!(
                    driver_id = %driver.driver_id,
                    session = %session_fingerprint(&conflict.session_id),
                    "Login refused: session bound to another device"
                );
                AuthError::DeviceMismatch
            })?;

        tracing::info!(
            driver_id = %driver.driver_id,
            session = %session_fingerprint(&issued.session.id),
            replaced = issued.replaced.is_some(),
            "Driver session issued"
        );

        Ok(Authenticated {
            driver,
            session: issued.session,
            replaced: issued.replaced,
        })
    }
}
