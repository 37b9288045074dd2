//! Request payload validation shared by the HTTP handlers and the
//! ingestion gate.

pub mod rules;

pub use validator::Validate;

use crate::error::AppError;

/// Runs derive-based validation, converting failures into `AppError::Validation`.
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload.validate().map_err(AppError::from)
}
