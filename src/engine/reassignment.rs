use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::engine::sequencing::parse_time_of_day;
use crate::error::AppError;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::event::FleetEvent;
use crate::models::job::{Job, JobAssignmentPatch, JobStatus};
use crate::models::reassignment::ReassignmentRecord;
use crate::state::FleetState;

/// Above this many open jobs the candidate driver is flagged, not blocked.
const MAX_OPEN_JOBS: usize = 10;

/// Two fixed-time jobs closer together than this are flagged as a schedule
/// conflict.
const FIXED_TIME_CONFLICT_WINDOW_MIN: u32 = 60;

#[derive(Debug, Clone)]
pub struct ReassignRequest {
    pub job_id: Uuid,
    pub new_driver_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub reason: String,
    pub notes: Option<String>,
    pub automatic: bool,
}

#[derive(Debug, Clone)]
pub struct BulkReassignRequest {
    pub job_ids: Vec<Uuid>,
    pub new_driver_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Workload {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkReassignOutcome {
    pub reassigned: Vec<Job>,
    pub records: Vec<ReassignmentRecord>,
    pub failed: usize,
}

/// Open (non-terminal) jobs held by a driver, recounted live on every call;
/// this feeds real-time decisions and must never be cached.
pub fn workload(state: &FleetState, driver_id: Uuid) -> Workload {
    let mut load = Workload {
        total: 0,
        pending: 0,
        in_progress: 0,
    };
    for entry in state.jobs.iter() {
        let job = entry.value();
        if job.driver_id != Some(driver_id) || job.status.is_terminal() {
            continue;
        }
        load.total += 1;
        match job.status {
            JobStatus::Pending => load.pending += 1,
            JobStatus::InProgress => load.in_progress += 1,
            _ => {}
        }
    }
    load
}

/// Advisory checks against the candidate driver. Conflicts never block a
/// reassignment; they are surfaced to the dispatcher and written into the
/// audit record.
pub fn detect_conflicts(state: &FleetState, job: &Job, new_driver_id: Option<Uuid>) -> Vec<String> {
    let Some(driver_id) = new_driver_id else {
        return Vec::new();
    };
    let Some(driver) = state.drivers.get(&driver_id).map(|d| d.value().clone()) else {
        return Vec::new();
    };

    let mut conflicts = Vec::new();

    let load = workload(state, driver_id);
    if load.total >= MAX_OPEN_JOBS {
        conflicts.push(format!(
            "{} already has {} open jobs",
            driver.name, load.total
        ));
    }
    if driver.vehicle_id.is_none() {
        conflicts.push(format!("{} has no vehicle assigned", driver.name));
    }
    if driver.status != DriverStatus::Active {
        conflicts.push(format!("{} is not active", driver.name));
    }

    if let Some(minutes) = job.fixed_arrival().and_then(parse_time_of_day) {
        for entry in state.jobs.iter() {
            let other = entry.value();
            if other.id == job.id
                || other.driver_id != Some(driver_id)
                || other.status.is_terminal()
            {
                continue;
            }
            let Some(other_minutes) = other.fixed_arrival().and_then(parse_time_of_day) else {
                continue;
            };
            if minutes.abs_diff(other_minutes) <= FIXED_TIME_CONFLICT_WINDOW_MIN {
                conflicts.push(format!(
                    "fixed-time overlap with job {} within {} minutes",
                    other.number, FIXED_TIME_CONFLICT_WINDOW_MIN
                ));
            }
        }
    }

    conflicts
}

/// Moves a job to `new_driver_id` (or back to the unassigned pool when
/// `None`) and appends exactly one audit record capturing the pre-update
/// driver and status. The job row lock is held across the read-decide-write
/// so two concurrent reassignments of the same job serialize instead of
/// overwriting each other.
pub fn reassign(
    state: &FleetState,
    request: ReassignRequest,
    at: DateTime<Utc>,
) -> Result<(Job, ReassignmentRecord), AppError> {
    let result = reassign_inner(state, request, at);
    let outcome = if result.is_ok() { "success" } else { "error" };
    state
        .metrics
        .reassignments_total
        .with_label_values(&[outcome])
        .inc();
    result
}

fn reassign_inner(
    state: &FleetState,
    request: ReassignRequest,
    at: DateTime<Utc>,
) -> Result<(Job, ReassignmentRecord), AppError> {
    if request.reason.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "a reassignment reason is required".to_string(),
        ));
    }

    let new_driver: Option<Driver> = match request.new_driver_id {
        Some(id) => Some(
            state
                .drivers
                .get(&id)
                .map(|d| d.value().clone())
                .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?,
        ),
        None => None,
    };

    // Conflict detection iterates the job table, so it runs on a snapshot
    // taken before the row lock below; holding the lock while iterating
    // would invite shard deadlocks.
    let snapshot = state
        .jobs
        .get(&request.job_id)
        .map(|j| j.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("job {} not found", request.job_id)))?;
    let conflicts = detect_conflicts(state, &snapshot, request.new_driver_id);

    let (previous, updated) = {
        let mut job = state
            .jobs
            .get_mut(&request.job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {} not found", request.job_id)))?;

        if job.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "job {} is {:?} and no longer accepts assignment changes",
                job.number, job.status
            )));
        }

        let previous = job.clone();
        job.apply_assignment(JobAssignmentPatch {
            driver_id: request.new_driver_id,
            vehicle_id: new_driver.as_ref().and_then(|d| d.vehicle_id),
            status: if request.new_driver_id.is_some() {
                JobStatus::Assigned
            } else {
                JobStatus::Pending
            },
        });
        (previous, job.clone())
    };

    let from_driver_name = previous
        .driver_id
        .and_then(|id| state.drivers.get(&id).map(|d| d.name.clone()));

    let record_id = Uuid::new_v4();
    let event = if request.new_driver_id.is_some() {
        FleetEvent::JobReassigned {
            job: updated.clone(),
            record_id,
        }
    } else {
        FleetEvent::JobUnassigned {
            job: updated.clone(),
            record_id,
        }
    };
    let notification_sent = state.events_tx.send(event).is_ok();

    let record = ReassignmentRecord {
        id: record_id,
        job_id: updated.id,
        job_number: updated.number.clone(),
        from_driver_id: previous.driver_id,
        from_driver_name,
        to_driver_id: request.new_driver_id,
        to_driver_name: new_driver.as_ref().map(|d| d.name.clone()),
        actor_id: request.actor_id,
        actor_name: request.actor_name,
        reason: request.reason,
        notes: request.notes,
        previous_status: previous.status,
        new_status: updated.status,
        conflicts,
        automatic: request.automatic,
        notification_sent,
        created_at: at,
    };
    state.reassignments.insert(record.id, record.clone());

    for driver_id in [previous.driver_id, request.new_driver_id].into_iter().flatten() {
        state
            .metrics
            .driver_workload
            .with_label_values(&[&driver_id.to_string()])
            .set(workload(state, driver_id).total as f64);
    }

    Ok((updated, record))
}

/// Best-effort batch: each job is reassigned independently and a failure on
/// one never aborts the rest. Callers get the successes plus a failure
/// count; result order carries no meaning.
pub fn bulk_reassign(
    state: &FleetState,
    request: BulkReassignRequest,
    at: DateTime<Utc>,
) -> BulkReassignOutcome {
    let mut outcome = BulkReassignOutcome::default();

    for job_id in request.job_ids {
        let single = ReassignRequest {
            job_id,
            new_driver_id: request.new_driver_id,
            actor_id: request.actor_id,
            actor_name: request.actor_name.clone(),
            reason: request.reason.clone(),
            notes: request.notes.clone(),
            automatic: false,
        };
        match reassign(state, single, at) {
            Ok((job, record)) => {
                outcome.reassigned.push(job);
                outcome.records.push(record);
            }
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "skipping job in bulk reassignment");
                outcome.failed += 1;
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    use super::{
        bulk_reassign, detect_conflicts, reassign, workload, BulkReassignRequest, ReassignRequest,
    };
    use crate::error::AppError;
    use crate::models::driver::{Driver, DriverStatus};
    use crate::models::job::{Job, JobStatus, OrderHint, Priority};
    use crate::state::FleetState;

    fn state() -> FleetState {
        FleetState::new(16, 300)
    }

    fn add_driver(state: &FleetState, name: &str, vehicle: bool) -> Uuid {
        let driver = Driver {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: DriverStatus::Active,
            vehicle_id: vehicle.then(Uuid::new_v4),
            created_at: Utc::now(),
        };
        let id = driver.id;
        state.drivers.insert(id, driver);
        id
    }

    fn add_job(state: &FleetState, number: &str) -> Uuid {
        let job = Job {
            id: Uuid::new_v4(),
            number: number.to_string(),
            customer_id: None,
            pickup_address: "Depot 1".to_string(),
            delivery_address: "Main St 4".to_string(),
            driver_id: None,
            vehicle_id: None,
            status: JobStatus::Pending,
            priority: Priority::Medium,
            order_hint: OrderHint::Auto,
            scheduled_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            scheduled_time: None,
            has_fixed_time: false,
            arrival_time: None,
            carried_over: false,
            created_at: Utc::now(),
        };
        let id = job.id;
        state.jobs.insert(id, job);
        id
    }

    fn request(job_id: Uuid, new_driver_id: Option<Uuid>) -> ReassignRequest {
        ReassignRequest {
            job_id,
            new_driver_id,
            actor_id: Uuid::new_v4(),
            actor_name: "Dispatcher Dana".to_string(),
            reason: "customer asked for the afternoon".to_string(),
            notes: None,
            automatic: false,
        }
    }

    #[test]
    fn reassign_assigns_driver_and_vehicle() {
        let state = state();
        let driver_id = add_driver(&state, "Kim Reyes", true);
        let job_id = add_job(&state, "J-100");

        let (job, record) = reassign(&state, request(job_id, Some(driver_id)), Utc::now()).unwrap();

        assert_eq!(job.driver_id, Some(driver_id));
        assert_eq!(job.status, JobStatus::Assigned);
        assert!(job.vehicle_id.is_some());
        assert_eq!(record.from_driver_id, None);
        assert_eq!(record.previous_status, JobStatus::Pending);
        assert_eq!(record.new_status, JobStatus::Assigned);
        assert_eq!(record.to_driver_name.as_deref(), Some("Kim Reyes"));
    }

    #[test]
    fn audit_record_snapshots_pre_update_state() {
        let state = state();
        let first = add_driver(&state, "Kim Reyes", true);
        let second = add_driver(&state, "Ola Nord", true);
        let job_id = add_job(&state, "J-101");

        reassign(&state, request(job_id, Some(first)), Utc::now()).unwrap();
        let (_, record) = reassign(&state, request(job_id, Some(second)), Utc::now()).unwrap();

        assert_eq!(record.from_driver_id, Some(first));
        assert_eq!(record.from_driver_name.as_deref(), Some("Kim Reyes"));
        assert_eq!(record.previous_status, JobStatus::Assigned);
        assert_eq!(record.to_driver_id, Some(second));
        assert_eq!(state.reassignment_history(Some(job_id), None).len(), 2);
    }

    #[test]
    fn unassign_returns_job_to_pending_pool() {
        let state = state();
        let driver_id = add_driver(&state, "Kim Reyes", true);
        let job_id = add_job(&state, "J-102");
        reassign(&state, request(job_id, Some(driver_id)), Utc::now()).unwrap();

        let (job, record) = reassign(&state, request(job_id, None), Utc::now()).unwrap();

        assert_eq!(job.driver_id, None);
        assert_eq!(job.vehicle_id, None);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(record.to_driver_id, None);
        assert!(record.to_driver_name.is_none());
    }

    #[test]
    fn blank_reason_is_rejected() {
        let state = state();
        let job_id = add_job(&state, "J-103");
        let mut req = request(job_id, None);
        req.reason = "   ".to_string();

        let err = reassign(&state, req, Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[test]
    fn unknown_job_and_driver_are_not_found() {
        let state = state();
        let job_id = add_job(&state, "J-104");

        let err = reassign(&state, request(Uuid::new_v4(), None), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = reassign(&state, request(job_id, Some(Uuid::new_v4())), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn completed_job_refuses_reassignment() {
        let state = state();
        let driver_id = add_driver(&state, "Kim Reyes", true);
        let job_id = add_job(&state, "J-105");
        state.jobs.get_mut(&job_id).unwrap().status = JobStatus::Completed;

        let err = reassign(&state, request(job_id, Some(driver_id)), Utc::now()).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(state.reassignment_history(Some(job_id), None).is_empty());
    }

    #[test]
    fn conflicts_flag_workload_vehicle_and_status() {
        let state = state();
        let driver_id = add_driver(&state, "Ola Nord", false);
        state.drivers.get_mut(&driver_id).unwrap().status = DriverStatus::Suspended;
        for n in 0..10 {
            let job_id = add_job(&state, &format!("J-2{n:02}"));
            let mut job = state.jobs.get_mut(&job_id).unwrap();
            job.driver_id = Some(driver_id);
            job.status = JobStatus::Assigned;
        }
        let job_id = add_job(&state, "J-300");
        let job = state.jobs.get(&job_id).unwrap().value().clone();

        let conflicts = detect_conflicts(&state, &job, Some(driver_id));

        assert_eq!(conflicts.len(), 3);
        assert!(conflicts.iter().any(|c| c.contains("open jobs")));
        assert!(conflicts.iter().any(|c| c.contains("no vehicle")));
        assert!(conflicts.iter().any(|c| c.contains("not active")));
    }

    #[test]
    fn conflicts_flag_fixed_time_overlap() {
        let state = state();
        let driver_id = add_driver(&state, "Kim Reyes", true);

        let held_id = add_job(&state, "J-400");
        {
            let mut held = state.jobs.get_mut(&held_id).unwrap();
            held.driver_id = Some(driver_id);
            held.status = JobStatus::Assigned;
            held.has_fixed_time = true;
            held.arrival_time = Some("10:00".to_string());
        }

        let candidate_id = add_job(&state, "J-401");
        {
            let mut candidate = state.jobs.get_mut(&candidate_id).unwrap();
            candidate.has_fixed_time = true;
            candidate.arrival_time = Some("10:45".to_string());
        }
        let candidate = state.jobs.get(&candidate_id).unwrap().value().clone();

        let conflicts = detect_conflicts(&state, &candidate, Some(driver_id));
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].contains("J-400"));

        // 90 minutes apart is outside the window
        state
            .jobs
            .get_mut(&candidate_id)
            .unwrap()
            .arrival_time = Some("11:30".to_string());
        let candidate = state.jobs.get(&candidate_id).unwrap().value().clone();
        assert!(detect_conflicts(&state, &candidate, Some(driver_id)).is_empty());
    }

    #[test]
    fn conflicts_are_advisory_and_recorded() {
        let state = state();
        let driver_id = add_driver(&state, "Ola Nord", false);
        let job_id = add_job(&state, "J-500");

        let (job, record) = reassign(&state, request(job_id, Some(driver_id)), Utc::now()).unwrap();

        assert_eq!(job.status, JobStatus::Assigned);
        assert!(record.conflicts.iter().any(|c| c.contains("no vehicle")));
    }

    #[test]
    fn bulk_reassign_swallows_stale_ids() {
        let state = state();
        let driver_id = add_driver(&state, "Kim Reyes", true);
        let mut job_ids: Vec<Uuid> = (0..4).map(|n| add_job(&state, &format!("J-6{n:02}"))).collect();
        job_ids.push(Uuid::new_v4());

        let outcome = bulk_reassign(
            &state,
            BulkReassignRequest {
                job_ids,
                new_driver_id: Some(driver_id),
                actor_id: Uuid::new_v4(),
                actor_name: "Dispatcher Dana".to_string(),
                reason: "rebalancing the afternoon run".to_string(),
                notes: None,
            },
            Utc::now(),
        );

        assert_eq!(outcome.reassigned.len(), 4);
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.failed, 1);
    }

    #[test]
    fn workload_counts_only_open_jobs() {
        let state = state();
        let driver_id = add_driver(&state, "Kim Reyes", true);
        for (n, status) in [
            JobStatus::Assigned,
            JobStatus::InProgress,
            JobStatus::Completed,
        ]
        .into_iter()
        .enumerate()
        {
            let job_id = add_job(&state, &format!("J-7{n:02}"));
            let mut job = state.jobs.get_mut(&job_id).unwrap();
            job.driver_id = Some(driver_id);
            job.status = status;
        }

        let load = workload(&state, driver_id);
        assert_eq!(load.total, 2);
        assert_eq!(load.in_progress, 1);
        assert_eq!(load.pending, 0);
    }
}
