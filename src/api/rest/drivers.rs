use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::reassignment::{workload, Workload};
use crate::engine::shift::{check_shift_status, ShiftCheck};
use crate::error::AppError;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::shift::{Shift, ShiftStatus};
use crate::state::FleetState;

pub fn router() -> Router<Arc<FleetState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/status", patch(update_driver_status))
        .route("/drivers/:id/vehicle", patch(update_driver_vehicle))
        .route("/drivers/:id/workload", get(driver_workload))
        .route("/drivers/:id/shift-check", post(shift_check))
        .route("/drivers/:id/shifts", get(list_driver_shifts))
        .route("/shifts", post(create_shift))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub vehicle_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: DriverStatus,
}

#[derive(Deserialize)]
pub struct UpdateVehicleRequest {
    pub vehicle_id: Option<Uuid>,
}

async fn create_driver(
    State(state): State<Arc<FleetState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidArgument("name cannot be empty".to_string()));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name,
        status: DriverStatus::Active,
        vehicle_id: payload.vehicle_id,
        created_at: Utc::now(),
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<FleetState>>) -> Json<Vec<Driver>> {
    let drivers = state
        .drivers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(drivers)
}

async fn update_driver_status(
    State(state): State<Arc<FleetState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Driver>, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    driver.status = payload.status;
    Ok(Json(driver.clone()))
}

async fn update_driver_vehicle(
    State(state): State<Arc<FleetState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVehicleRequest>,
) -> Result<Json<Driver>, AppError> {
    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    driver.vehicle_id = payload.vehicle_id;
    Ok(Json(driver.clone()))
}

async fn driver_workload(
    State(state): State<Arc<FleetState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Workload>, AppError> {
    if !state.drivers.contains_key(&id) {
        return Err(AppError::NotFound(format!("driver {id} not found")));
    }
    Ok(Json(workload(&state, id)))
}

#[derive(Deserialize)]
pub struct ShiftCheckRequest {
    pub at: Option<DateTime<Utc>>,
}

async fn shift_check(
    State(state): State<Arc<FleetState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ShiftCheckRequest>,
) -> Json<ShiftCheck> {
    let at = payload.at.unwrap_or_else(Utc::now);
    Json(check_shift_status(&state, id, at))
}

async fn list_driver_shifts(
    State(state): State<Arc<FleetState>>,
    Path(id): Path<Uuid>,
) -> Json<Vec<Shift>> {
    Json(state.shifts_for_driver(id))
}

#[derive(Deserialize)]
pub struct CreateShiftRequest {
    pub driver_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: Option<ShiftStatus>,
}

async fn create_shift(
    State(state): State<Arc<FleetState>>,
    Json(payload): Json<CreateShiftRequest>,
) -> Result<Json<Shift>, AppError> {
    if !state.drivers.contains_key(&payload.driver_id) {
        return Err(AppError::NotFound(format!(
            "driver {} not found",
            payload.driver_id
        )));
    }
    if payload.ends_at <= payload.starts_at {
        return Err(AppError::InvalidArgument(
            "shift must end after it starts".to_string(),
        ));
    }

    let shift = Shift {
        id: Uuid::new_v4(),
        driver_id: payload.driver_id,
        starts_at: payload.starts_at,
        ends_at: payload.ends_at,
        status: payload.status.unwrap_or(ShiftStatus::Active),
        actual_start: None,
        actual_end: None,
    };

    state.shifts.insert(shift.id, shift.clone());
    Ok(Json(shift))
}
