use chrono::NaiveDate;

use crate::models::job::Job;

/// Sentinel for fixed-time jobs whose arrival string does not parse; they
/// stay in the fixed-time group but sort after every parseable one.
const UNPARSEABLE_MINUTES: u32 = u32::MAX;

/// Validated HH:MM parse, minutes since midnight. Extra trailing segments
/// (HH:MM:SS) are ignored; out-of-range hours or minutes fail the parse.
pub fn parse_time_of_day(raw: &str) -> Option<u32> {
    let mut parts = raw.trim().splitn(3, ':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = parts.next()?.trim().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

fn dispatch_key(job: &Job) -> (u8, u32, u8, u8, NaiveDate) {
    let (tier, minutes) = match job.fixed_arrival() {
        Some(raw) => (0, parse_time_of_day(raw).unwrap_or(UNPARSEABLE_MINUTES)),
        None => (1, 0),
    };
    (
        tier,
        minutes,
        job.order_hint.rank(),
        job.priority.rank(),
        job.scheduled_date,
    )
}

/// Dispatcher-facing route order. Fixed-time jobs lead, sorted by clock
/// time; the rest fall back to the manual order hint, then urgency, then
/// scheduled date. One stable sort, so jobs equal on every tier keep their
/// input order.
pub fn sequence_for_dispatch(mut jobs: Vec<Job>) -> Vec<Job> {
    jobs.sort_by_key(dispatch_key);
    jobs
}

/// Legacy "suggest an order" behavior: scheduled date only, everything else
/// ignored. Kept as its own entry point rather than a flag on the main
/// comparator.
pub fn sequence_by_date(mut jobs: Vec<Job>) -> Vec<Job> {
    jobs.sort_by_key(|job| job.scheduled_date);
    jobs
}
