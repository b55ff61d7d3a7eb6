use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::reassignment::{
    bulk_reassign, detect_conflicts, reassign, BulkReassignOutcome, BulkReassignRequest,
    ReassignRequest,
};
use crate::engine::sequencing::{sequence_by_date, sequence_for_dispatch};
use crate::error::AppError;
use crate::models::event::FleetEvent;
use crate::models::job::{Job, JobStatus, OrderHint, Priority};
use crate::models::reassignment::ReassignmentRecord;
use crate::state::FleetState;

pub fn router() -> Router<Arc<FleetState>> {
    Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/sequenced", get(sequenced_jobs))
        .route("/jobs/date-ordered", get(date_ordered_jobs))
        .route("/jobs/bulk-reassign", post(bulk_reassign_jobs))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/reassign", post(reassign_job))
        .route("/jobs/:id/conflicts", get(preview_conflicts))
        .route("/reassignments", get(list_reassignments))
}

#[derive(Deserialize)]
pub struct CreateJobRequest {
    pub number: Option<String>,
    pub customer_id: Option<Uuid>,
    pub pickup_address: String,
    pub delivery_address: String,
    pub priority: Option<Priority>,
    #[serde(default)]
    pub order_hint: OrderHint,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub has_fixed_time: bool,
    pub arrival_time: Option<String>,
}

async fn create_job(
    State(state): State<Arc<FleetState>>,
    Json(payload): Json<CreateJobRequest>,
) -> Result<Json<Job>, AppError> {
    if payload.pickup_address.trim().is_empty() || payload.delivery_address.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "pickup and delivery addresses are required".to_string(),
        ));
    }

    let id = Uuid::new_v4();
    let number = payload
        .number
        .unwrap_or_else(|| format!("J-{}", &id.simple().to_string()[..8]));

    let job = Job {
        id,
        number,
        customer_id: payload.customer_id,
        pickup_address: payload.pickup_address,
        delivery_address: payload.delivery_address,
        driver_id: None,
        vehicle_id: None,
        status: JobStatus::Pending,
        priority: payload.priority.unwrap_or(Priority::Medium),
        order_hint: payload.order_hint,
        scheduled_date: payload.scheduled_date,
        scheduled_time: payload.scheduled_time,
        has_fixed_time: payload.has_fixed_time,
        arrival_time: payload.arrival_time,
        carried_over: false,
        created_at: Utc::now(),
    };

    state.jobs.insert(job.id, job.clone());
    let _ = state.events_tx.send(FleetEvent::JobCreated { job: job.clone() });

    Ok(Json(job))
}

async fn list_jobs(State(state): State<Arc<FleetState>>) -> Json<Vec<Job>> {
    let jobs = state.jobs.iter().map(|entry| entry.value().clone()).collect();
    Json(jobs)
}

async fn get_job(
    State(state): State<Arc<FleetState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .jobs
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

    Ok(Json(job.value().clone()))
}

async fn sequenced_jobs(State(state): State<Arc<FleetState>>) -> Json<Vec<Job>> {
    let jobs: Vec<Job> = state.jobs.iter().map(|entry| entry.value().clone()).collect();
    Json(sequence_for_dispatch(jobs))
}

async fn date_ordered_jobs(State(state): State<Arc<FleetState>>) -> Json<Vec<Job>> {
    let jobs: Vec<Job> = state.jobs.iter().map(|entry| entry.value().clone()).collect();
    Json(sequence_by_date(jobs))
}

#[derive(Deserialize)]
pub struct ReassignJobRequest {
    pub driver_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct ReassignJobResponse {
    pub job: Job,
    pub record: ReassignmentRecord,
}

async fn reassign_job(
    State(state): State<Arc<FleetState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReassignJobRequest>,
) -> Result<Json<ReassignJobResponse>, AppError> {
    let request = ReassignRequest {
        job_id: id,
        new_driver_id: payload.driver_id,
        actor_id: payload.actor_id,
        actor_name: payload.actor_name,
        reason: payload.reason,
        notes: payload.notes,
        automatic: false,
    };

    let (job, record) = reassign(&state, request, Utc::now())?;
    Ok(Json(ReassignJobResponse { job, record }))
}

#[derive(Deserialize)]
pub struct BulkReassignJobsRequest {
    pub job_ids: Vec<Uuid>,
    pub driver_id: Option<Uuid>,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub reason: String,
    pub notes: Option<String>,
}

async fn bulk_reassign_jobs(
    State(state): State<Arc<FleetState>>,
    Json(payload): Json<BulkReassignJobsRequest>,
) -> Json<BulkReassignOutcome> {
    let request = BulkReassignRequest {
        job_ids: payload.job_ids,
        new_driver_id: payload.driver_id,
        actor_id: payload.actor_id,
        actor_name: payload.actor_name,
        reason: payload.reason,
        notes: payload.notes,
    };

    Json(bulk_reassign(&state, request, Utc::now()))
}

#[derive(Deserialize)]
pub struct ConflictQuery {
    pub driver_id: Option<Uuid>,
}

async fn preview_conflicts(
    State(state): State<Arc<FleetState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ConflictQuery>,
) -> Result<Json<Vec<String>>, AppError> {
    let job = state
        .jobs
        .get(&id)
        .map(|j| j.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

    Ok(Json(detect_conflicts(&state, &job, query.driver_id)))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub job_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
}

async fn list_reassignments(
    State(state): State<Arc<FleetState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<ReassignmentRecord>> {
    Json(state.reassignment_history(query.job_id, query.driver_id))
}
