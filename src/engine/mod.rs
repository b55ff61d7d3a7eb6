pub mod geofence;
pub mod reassignment;
pub mod scoring;
pub mod sequencing;
pub mod shift;
