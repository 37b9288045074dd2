use axum::{
    extract::{Path, State},
    Json,
};
use std::str::FromStr;

use crate::{
    error::AppError,
    models::{AssignVehicleRequest, Driver},
    state::AppState,
    types::DriverId,
    validation::validate_payload,
};

pub async fn assign_vehicle(
    State(state): State<AppState>,
    Path(driver_id): Path<String>,
    Json(payload): Json<AssignVehicleRequest>,
) -> Result<Json<Driver>, AppError> {
    let driver_id = DriverId::from_str(&driver_id)
        .map_err(|_| AppError::BadRequest("Invalid driver ID".into()))?;
    validate_payload(&payload)?;

    let driver = state
        .drivers
        .find_by_id(driver_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Driver not found".into()))?;
    if driver.is_deactivated() {
        return Err(AppError::BadRequest(
            "Deactivated drivers cannot be reassigned".into(),
        ));
    }

    let updated = state
        .drivers
        .assign_vehicle(driver_id, payload.bus_id, payload.route_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Driver not found".into()))?;

    tracing::info!(
        driver_id = %updated.driver_id,
        bus_id = updated.bus_id.as_deref().unwrap_or("-"),
        route_id = updated.route_id.as_deref().unwrap_or("-"),
        "Driver reassigned"
    );
    Ok(Json(updated))
}
