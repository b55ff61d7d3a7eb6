use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::customer::Customer;
use crate::models::driver::Driver;
use crate::models::event::FleetEvent;
use crate::models::geofence::{Geofence, GeofenceEvent};
use crate::models::job::{Job, JobStatus};
use crate::models::reassignment::ReassignmentRecord;
use crate::models::shift::Shift;
use crate::observability::metrics::Metrics;

/// In-memory persistence layer. Keyed DashMaps give per-row locking: a
/// `get_mut` guard held across a read-decide-write keeps two concurrent
/// mutations of the same job (or the same geofence cool-down slot) from
/// overwriting each other.
pub struct FleetState {
    pub jobs: DashMap<Uuid, Job>,
    pub drivers: DashMap<Uuid, Driver>,
    pub shifts: DashMap<Uuid, Shift>,
    pub customers: DashMap<Uuid, Customer>,
    pub geofences: DashMap<Uuid, Geofence>,
    pub geofence_events: DashMap<Uuid, GeofenceEvent>,
    pub reassignments: DashMap<Uuid, ReassignmentRecord>,
    last_entry: DashMap<(Uuid, Option<Uuid>), DateTime<Utc>>,
    pub events_tx: broadcast::Sender<FleetEvent>,
    pub entry_cooldown: Duration,
    pub metrics: Metrics,
}

impl FleetState {
    pub fn new(event_buffer_size: usize, geofence_cooldown_secs: i64) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            jobs: DashMap::new(),
            drivers: DashMap::new(),
            shifts: DashMap::new(),
            customers: DashMap::new(),
            geofences: DashMap::new(),
            geofence_events: DashMap::new(),
            reassignments: DashMap::new(),
            last_entry: DashMap::new(),
            events_tx,
            entry_cooldown: Duration::seconds(geofence_cooldown_secs),
            metrics: Metrics::new(),
        }
    }

    /// Atomic cool-down check for an entry event keyed on (geofence, driver).
    /// Returns true when a new entry may be recorded and stamps the slot; the
    /// entry lock is held across the check and the write so two concurrent
    /// pings cannot both claim the same slot.
    pub fn claim_geofence_entry(
        &self,
        geofence_id: Uuid,
        driver_id: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> bool {
        match self.last_entry.entry((geofence_id, driver_id)) {
            Entry::Occupied(mut seen) => {
                if at.signed_duration_since(*seen.get()) < self.entry_cooldown {
                    false
                } else {
                    seen.insert(at);
                    true
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(at);
                true
            }
        }
    }

    pub fn jobs_for_driver(&self, driver_id: Uuid, status: Option<JobStatus>) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|entry| {
                let job = entry.value();
                job.driver_id == Some(driver_id) && status.is_none_or(|s| job.status == s)
            })
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn shifts_for_driver(&self, driver_id: Uuid) -> Vec<Shift> {
        self.shifts
            .iter()
            .filter(|entry| entry.value().driver_id == driver_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Reassignment history, newest first. Either side of the move matches a
    /// driver filter.
    pub fn reassignment_history(
        &self,
        job_id: Option<Uuid>,
        driver_id: Option<Uuid>,
    ) -> Vec<ReassignmentRecord> {
        let mut records: Vec<ReassignmentRecord> = self
            .reassignments
            .iter()
            .filter(|entry| {
                let record = entry.value();
                job_id.is_none_or(|id| record.job_id == id)
                    && driver_id.is_none_or(|id| {
                        record.from_driver_id == Some(id) || record.to_driver_id == Some(id)
                    })
            })
            .map(|entry| entry.value().clone())
            .collect();

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub fn events_for_geofence(&self, geofence_id: Uuid) -> Vec<GeofenceEvent> {
        let mut events: Vec<GeofenceEvent> = self
            .geofence_events
            .iter()
            .filter(|entry| entry.value().geofence_id == geofence_id)
            .map(|entry| entry.value().clone())
            .collect();

        events.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        events
    }
}
