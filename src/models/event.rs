use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::Job;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Urgent,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub kind: String,
    pub message: String,
    pub severity: Severity,
    pub related_entity_type: String,
    pub related_entity_id: Uuid,
}

/// Broadcast to live dashboard subscribers. Delivery is fire-and-forget;
/// nothing in the core depends on a subscriber being present.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FleetEvent {
    JobCreated { job: Job },
    JobReassigned { job: Job, record_id: Uuid },
    JobUnassigned { job: Job, record_id: Uuid },
    JobsReclaimed { driver_id: Uuid, job_ids: Vec<Uuid> },
    GeofenceAlert { alert: Alert },
}
