//! Client side of the bus-tracking contract: a driver HTTP API client, a
//! reconnecting observer for the live WebSocket feed, and device identity
//! providers.

pub mod api;
pub mod config;
pub mod device;
pub mod error;
pub mod observer;
pub mod protocol;

pub use api::DriverApiClient;
pub use config::{ApiClientConfig, ObserverConfig};
pub use device::{DeviceIdentity, FileDeviceIdentity, FixedDeviceIdentity};
pub use error::{AuthFailure, ClientError, SessionFailure};
pub use observer::{ConnectionStatus, ObserverClient, ObserverEvent, ObserverHandle};
