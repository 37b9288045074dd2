pub mod audit_logs;
pub mod drivers;
pub mod sessions;

pub use audit_logs::*;
pub use drivers::*;
pub use sessions::*;
