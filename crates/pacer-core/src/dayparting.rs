//! Dayparting window evaluation

use chrono::{DateTime, Utc};
use pacer_api::DaypartingSchedule;

/// Whether a campaign with this (optional) schedule may run at `now`.
///
/// No schedule means always eligible by time.
pub fn is_active_now(schedule: Option<&DaypartingSchedule>, now: DateTime<Utc>) -> bool {
    schedule.is_none_or(|s| in_window(s, now))
}

/// Whether `now`, read on the schedule's wall clock, falls inside the window.
///
/// Both ends are inclusive. `start > end` wraps midnight; `start == end`
/// takes the same-day branch and matches that single instant only.
pub fn in_window(schedule: &DaypartingSchedule, now: DateTime<Utc>) -> bool {
    let t = now.with_timezone(&schedule.timezone).time();
    let (start, end) = (schedule.start_time, schedule.end_time);

    if start <= end {
        start <= t && t <= end
    } else {
        t >= start || t <= end
    }
}
