//! Time-of-day arithmetic for timeline construction
//!
//! A segment's schedule lives entirely inside one calendar day, so every
//! shift is checked against the midnight boundary instead of wrapping.

use chrono::{NaiveTime, Timelike};

const DAY_SECONDS: i64 = 24 * 60 * 60;

/// Seconds since 00:00.
pub fn seconds_from_midnight(t: NaiveTime) -> i64 {
    t.num_seconds_from_midnight() as i64
}

/// Shift a time of day by a signed number of seconds. `None` when the
/// result would leave the day (the legacy midnight guard).
pub fn add_seconds(t: NaiveTime, seconds: i64) -> Option<NaiveTime> {
    let total = seconds_from_midnight(t) + seconds;
    if !(0..DAY_SECONDS).contains(&total) {
        return None;
    }
    NaiveTime::from_num_seconds_from_midnight_opt(total as u32, 0)
}

/// Signed distance `a - b` in seconds.
pub fn diff_seconds(a: NaiveTime, b: NaiveTime) -> i64 {
    seconds_from_midnight(a) - seconds_from_midnight(b)
}
