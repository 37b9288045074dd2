pub mod audit_log;
pub mod auth;
pub mod ingest;
pub mod session;
pub mod sweeper;
