use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::geofence::{check_proximity, ensure_customer_geofence, ProximityPing};
use crate::error::AppError;
use crate::models::customer::Customer;
use crate::models::geofence::{GeoPoint, Geofence, GeofenceEvent, GeofenceKind};
use crate::state::FleetState;

pub fn router() -> Router<Arc<FleetState>> {
    Router::new()
        .route("/geofences", post(create_geofence).get(list_geofences))
        .route("/geofences/check", post(proximity_check))
        .route("/geofences/:id/events", get(list_geofence_events))
        .route("/customers", post(create_customer))
        .route("/customers/:id/geofence", post(provision_customer_geofence))
}

#[derive(Deserialize)]
pub struct CreateGeofenceRequest {
    pub name: String,
    pub kind: GeofenceKind,
    pub center: GeoPoint,
    pub radius_m: f64,
    #[serde(default = "default_true")]
    pub alert_on_entry: bool,
    #[serde(default)]
    pub alert_on_exit: bool,
    #[serde(default)]
    pub alert_on_dwell: bool,
    pub customer_id: Option<Uuid>,
}

fn default_true() -> bool {
    true
}

async fn create_geofence(
    State(state): State<Arc<FleetState>>,
    Json(payload): Json<CreateGeofenceRequest>,
) -> Result<Json<Geofence>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidArgument("name cannot be empty".to_string()));
    }
    if payload.radius_m <= 0.0 {
        return Err(AppError::InvalidArgument(
            "radius must be positive".to_string(),
        ));
    }

    let fence = Geofence {
        id: Uuid::new_v4(),
        name: payload.name,
        kind: payload.kind,
        center: payload.center,
        radius_m: payload.radius_m,
        active: true,
        alert_on_entry: payload.alert_on_entry,
        alert_on_exit: payload.alert_on_exit,
        alert_on_dwell: payload.alert_on_dwell,
        customer_id: payload.customer_id,
    };

    state.geofences.insert(fence.id, fence.clone());
    Ok(Json(fence))
}

async fn list_geofences(State(state): State<Arc<FleetState>>) -> Json<Vec<Geofence>> {
    let fences = state
        .geofences
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(fences)
}

#[derive(Deserialize)]
pub struct ProximityCheckRequest {
    pub position: GeoPoint,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub at: Option<DateTime<Utc>>,
}

async fn proximity_check(
    State(state): State<Arc<FleetState>>,
    Json(payload): Json<ProximityCheckRequest>,
) -> Json<Vec<GeofenceEvent>> {
    let at = payload.at.unwrap_or_else(Utc::now);
    let ping = ProximityPing {
        position: payload.position,
        driver_id: payload.driver_id,
        vehicle_id: payload.vehicle_id,
        job_id: payload.job_id,
    };

    Json(check_proximity(&state, &ping, at))
}

async fn list_geofence_events(
    State(state): State<Arc<FleetState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<GeofenceEvent>>, AppError> {
    if !state.geofences.contains_key(&id) {
        return Err(AppError::NotFound(format!("geofence {id} not found")));
    }
    Ok(Json(state.events_for_geofence(id)))
}

#[derive(Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub address: String,
    pub location: Option<GeoPoint>,
}

async fn create_customer(
    State(state): State<Arc<FleetState>>,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<Json<Customer>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidArgument("name cannot be empty".to_string()));
    }

    let customer = Customer {
        id: Uuid::new_v4(),
        name: payload.name,
        address: payload.address,
        location: payload.location,
    };

    state.customers.insert(customer.id, customer.clone());
    Ok(Json(customer))
}

async fn provision_customer_geofence(
    State(state): State<Arc<FleetState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Geofence>, AppError> {
    Ok(Json(ensure_customer_geofence(&state, id)?))
}
