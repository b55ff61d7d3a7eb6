use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::models::event::FleetEvent;
use crate::models::job::{Job, JobStatus};
use crate::state::FleetState;

#[derive(Debug, Serialize)]
pub struct ShiftCheck {
    pub within_shift: bool,
    pub reclaimed: Vec<Job>,
}

/// Checks whether the driver is inside an active shift window at `at` and,
/// if not, reclaims every job still assigned to them as one logical batch.
/// A driver with no shifts (or no driver record at all) simply counts as
/// outside shift; repeated calls with nothing left to reclaim are no-ops.
pub fn check_shift_status(state: &FleetState, driver_id: Uuid, at: DateTime<Utc>) -> ShiftCheck {
    let within_shift = state
        .shifts_for_driver(driver_id)
        .iter()
        .any(|shift| shift.covers(at));

    if within_shift {
        return ShiftCheck {
            within_shift: true,
            reclaimed: Vec::new(),
        };
    }

    let assigned: Vec<Uuid> = state
        .jobs_for_driver(driver_id, Some(JobStatus::Assigned))
        .into_iter()
        .map(|job| job.id)
        .collect();

    let mut reclaimed = Vec::with_capacity(assigned.len());
    for job_id in assigned {
        if let Some(mut job) = state.jobs.get_mut(&job_id) {
            // Re-check under the row lock; a concurrent reassignment may
            // have moved the job since the snapshot.
            if job.driver_id != Some(driver_id) || job.status != JobStatus::Assigned {
                continue;
            }
            reclaimed.push(job.clone());
            job.apply_reclaim();
        }
    }

    if !reclaimed.is_empty() {
        state
            .metrics
            .jobs_reclaimed_total
            .inc_by(reclaimed.len() as u64);
        info!(
            driver_id = %driver_id,
            count = reclaimed.len(),
            "reclaimed jobs from driver outside shift window"
        );
        let _ = state.events_tx.send(FleetEvent::JobsReclaimed {
            driver_id,
            job_ids: reclaimed.iter().map(|job| job.id).collect(),
        });
    }

    ShiftCheck {
        within_shift: false,
        reclaimed,
    }
}
