use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::geofence::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub location: Option<GeoPoint>,
}
