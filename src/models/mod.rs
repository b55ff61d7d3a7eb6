pub mod customer;
pub mod driver;
pub mod event;
pub mod geofence;
pub mod job;
pub mod reassignment;
pub mod shift;
pub mod telemetry;
