pub mod driver;
pub mod location;
pub mod session;

pub use driver::{DriverRepository, InMemoryDriverRepository};
pub use location::{LocationStore, RecordOutcome};
pub use session::{DeviceConflict, IssuedSession, SessionStore, SweepReport};
