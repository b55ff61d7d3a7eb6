use prometheus::{
    Encoder, GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub reassignments_total: IntCounterVec,
    pub jobs_reclaimed_total: IntCounter,
    pub geofence_entries_total: IntCounterVec,
    pub driver_workload: GaugeVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let reassignments_total = IntCounterVec::new(
            Opts::new("reassignments_total", "Total reassignments by outcome"),
            &["outcome"],
        )
        .expect("valid reassignments_total metric");

        let jobs_reclaimed_total = IntCounter::new(
            "jobs_reclaimed_total",
            "Jobs reclaimed from drivers outside their shift window",
        )
        .expect("valid jobs_reclaimed_total metric");

        let geofence_entries_total = IntCounterVec::new(
            Opts::new("geofence_entries_total", "Geofence entry events by kind"),
            &["kind"],
        )
        .expect("valid geofence_entries_total metric");

        let driver_workload = GaugeVec::new(
            Opts::new("driver_workload", "Open (non-terminal) jobs per driver"),
            &["driver_id"],
        )
        .expect("valid driver_workload metric");

        registry
            .register(Box::new(reassignments_total.clone()))
            .expect("register reassignments_total");
        registry
            .register(Box::new(jobs_reclaimed_total.clone()))
            .expect("register jobs_reclaimed_total");
        registry
            .register(Box::new(geofence_entries_total.clone()))
            .expect("register geofence_entries_total");
        registry
            .register(Box::new(driver_workload.clone()))
            .expect("register driver_workload");

        Self {
            registry,
            reassignments_total,
            jobs_reclaimed_total,
            geofence_entries_total,
            driver_workload,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
