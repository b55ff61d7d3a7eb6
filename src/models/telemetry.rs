use serde::{Deserialize, Serialize};

/// Per-trip event counters reported by the telematics feed. Absent counters
/// deserialize to zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TripCounters {
    #[serde(default)]
    pub speed_violations: u32,
    #[serde(default)]
    pub harsh_brakes: u32,
    #[serde(default)]
    pub harsh_accelerations: u32,
    #[serde(default)]
    pub harsh_turns: u32,
    #[serde(default)]
    pub idle_seconds: u32,
}
