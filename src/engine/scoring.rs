use crate::models::telemetry::TripCounters;

const SPEEDING_PENALTY: f64 = 2.0;
const HARSH_EVENT_PENALTY: f64 = 1.5;
const IDLE_PENALTY_PER_MINUTE: f64 = 1.0;

/// Driving-behavior score in [0, 100], strictly non-increasing in every
/// counter. Starts at 100 and subtracts per-event penalties; idle time is
/// penalized per full minute.
pub fn behavior_score(counters: &TripCounters) -> u8 {
    let harsh_events =
        counters.harsh_brakes + counters.harsh_accelerations + counters.harsh_turns;
    let idle_minutes = counters.idle_seconds / 60;

    let penalty = SPEEDING_PENALTY * f64::from(counters.speed_violations)
        + HARSH_EVENT_PENALTY * f64::from(harsh_events)
        + IDLE_PENALTY_PER_MINUTE * f64::from(idle_minutes);

    (100.0 - penalty).clamp(0.0, 100.0).round() as u8
}
