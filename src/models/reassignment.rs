use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::JobStatus;

/// Append-only audit entry. Driver and actor names are snapshotted at the
/// time of the reassignment so history stays readable after renames or
/// deletions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignmentRecord {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_number: String,
    pub from_driver_id: Option<Uuid>,
    pub from_driver_name: Option<String>,
    pub to_driver_id: Option<Uuid>,
    pub to_driver_name: Option<String>,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub reason: String,
    pub notes: Option<String>,
    pub previous_status: JobStatus,
    pub new_status: JobStatus,
    pub conflicts: Vec<String>,
    pub automatic: bool,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
}
