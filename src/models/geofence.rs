use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceKind {
    CustomerAddress,
    RestrictedArea,
    Depot,
}

impl GeofenceKind {
    pub fn as_label(self) -> &'static str {
        match self {
            GeofenceKind::CustomerAddress => "customer_address",
            GeofenceKind::RestrictedArea => "restricted_area",
            GeofenceKind::Depot => "depot",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geofence {
    pub id: Uuid,
    pub name: String,
    pub kind: GeofenceKind,
    pub center: GeoPoint,
    pub radius_m: f64,
    pub active: bool,
    pub alert_on_entry: bool,
    pub alert_on_exit: bool,
    pub alert_on_dwell: bool,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceEventKind {
    Entry,
    Exit,
    Dwell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceEvent {
    pub id: Uuid,
    pub geofence_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub kind: GeofenceEventKind,
    pub position: GeoPoint,
    pub recorded_at: DateTime<Utc>,
    pub alert_sent: bool,
}
