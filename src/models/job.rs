use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// Terminal jobs accept no further assignment mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
    /// Catch-all for values the upstream data feed invents; ranks as Medium.
    #[serde(other)]
    Unspecified,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Medium | Priority::Unspecified => 2,
            Priority::Low => 3,
        }
    }
}

/// Manual dispatcher nudge, independent of the job's urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderHint {
    First,
    #[default]
    Auto,
    Last,
}

impl OrderHint {
    pub fn rank(self) -> u8 {
        match self {
            OrderHint::First => 0,
            OrderHint::Auto => 1,
            OrderHint::Last => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub number: String,
    pub customer_id: Option<Uuid>,
    pub pickup_address: String,
    pub delivery_address: String,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub status: JobStatus,
    pub priority: Priority,
    #[serde(default)]
    pub order_hint: OrderHint,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub has_fixed_time: bool,
    pub arrival_time: Option<String>,
    #[serde(default)]
    pub carried_over: bool,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// The arrival-time string, but only when it actually pins the job to a
    /// clock time: the fixed-time flag is set, the string is present, and it
    /// is not the "anytime" placeholder. Parsing happens in the sequencer.
    pub fn fixed_arrival(&self) -> Option<&str> {
        if !self.has_fixed_time {
            return None;
        }
        let trimmed = self.arrival_time.as_deref()?.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("anytime") {
            None
        } else {
            Some(trimmed)
        }
    }

    /// Reassignment is the only path allowed to touch these fields together.
    pub fn apply_assignment(&mut self, patch: JobAssignmentPatch) {
        self.driver_id = patch.driver_id;
        self.vehicle_id = patch.vehicle_id;
        self.status = patch.status;
    }

    /// Shift reclaim: the job returns to the unassigned pool untouched
    /// otherwise.
    pub fn apply_reclaim(&mut self) {
        self.driver_id = None;
        self.vehicle_id = None;
        self.status = JobStatus::Pending;
    }
}

/// Exactly the fields a reassignment may mutate.
#[derive(Debug, Clone, Copy)]
pub struct JobAssignmentPatch {
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub status: JobStatus,
}
