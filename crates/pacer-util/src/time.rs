//! Clock utilities for budget-pacer
//!
//! All instants are carried as UTC. Calendar questions (which day is it,
//! is this the first of the month, when is the next midnight) are answered
//! in an explicit timezone, usually the reconciliation clock from config.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `PACER_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is
//! useful for exercising dayparting windows and reset boundaries by hand.
//!
//! Format: `YYYY-MM-DD HH:MM:SS`, interpreted as UTC (e.g., `2025-12-01 00:00:05`)
//!
//! Example:
//! ```bash
//! PACER_MOCK_TIME="2025-12-01 00:00:05" pacerd reset-budgets
//! ```

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::OnceLock;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "PACER_MOCK_TIME";

/// Format accepted by `PACER_MOCK_TIME`
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<Duration>> = OnceLock::new();

fn get_mock_time_offset() -> Option<Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, MOCK_TIME_FORMAT) {
                    Ok(naive_dt) => {
                        let mock_dt = Utc.from_utc_datetime(&naive_dt);
                        let offset = mock_dt.signed_duration_since(Utc::now());
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = MOCK_TIME_FORMAT,
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current instant, respecting mock time settings in debug builds.
pub fn now() -> DateTime<Utc> {
    let real_now = Utc::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Format an instant with full date and time in the given timezone.
pub fn format_datetime_full(dt: &DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

/// Calendar date of `now` on the given clock
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Whether `now` falls on the first calendar day of a month on the given clock
pub fn is_first_of_month(now: DateTime<Utc>, tz: Tz) -> bool {
    local_date(now, tz).day() == 1
}

/// Resolve local midnight of `date` to an instant.
///
/// Midnight can fall into a DST gap (some zones switch at 00:00); the first
/// valid local time after it is used instead.
fn midnight_of(date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    (0..=2)
        .map(|h| midnight + Duration::hours(h))
        .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Start of the calendar day containing `now` on the given clock
pub fn start_of_day(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    midnight_of(local_date(now, tz), tz).unwrap_or(now)
}

/// The next local midnight strictly after `now`
pub fn next_midnight(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    local_date(now, tz)
        .succ_opt()
        .and_then(|tomorrow| midnight_of(tomorrow, tz))
        .unwrap_or_else(|| now + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_date_respects_timezone() {
        // 23:30 UTC on Dec 31 is already Jan 1 in Rome
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 30, 0).unwrap();
        assert_eq!(local_date(now, Tz::UTC), NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert_eq!(
            local_date(now, chrono_tz::Europe::Rome),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_is_first_of_month() {
        let first = Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 5).unwrap();
        let second = Utc.with_ymd_and_hms(2025, 12, 2, 0, 0, 5).unwrap();
        assert!(is_first_of_month(first, Tz::UTC));
        assert!(!is_first_of_month(second, Tz::UTC));

        // Still Nov 30 in New York
        assert!(!is_first_of_month(first, chrono_tz::America::New_York));
    }

    #[test]
    fn test_start_of_day() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 14, 30, 0).unwrap();
        assert_eq!(
            start_of_day(now, Tz::UTC),
            Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap()
        );
        // Rome is UTC+2 in June
        assert_eq!(
            start_of_day(now, chrono_tz::Europe::Rome),
            Utc.with_ymd_and_hms(2025, 6, 14, 22, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 14, 30, 0).unwrap();
        assert_eq!(
            next_midnight(now, Tz::UTC),
            Utc.with_ymd_and_hms(2025, 6, 16, 0, 0, 0).unwrap()
        );

        // Exactly at midnight the next one is a day away
        let midnight = Utc.with_ymd_and_hms(2025, 6, 16, 0, 0, 0).unwrap();
        assert_eq!(
            next_midnight(midnight, Tz::UTC),
            Utc.with_ymd_and_hms(2025, 6, 17, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_midnight_across_dst_gap() {
        // Havana skips from 00:00 to 01:00 on 2025-03-09
        let now = Utc.with_ymd_and_hms(2025, 3, 8, 12, 0, 0).unwrap();
        let next = next_midnight(now, chrono_tz::America::Havana);
        assert!(next > now);
        assert!(next - now < Duration::days(1));
    }

    #[test]
    fn test_format_datetime_full() {
        let dt = Utc.with_ymd_and_hms(2025, 12, 25, 14, 30, 45).unwrap();
        assert_eq!(format_datetime_full(&dt, Tz::UTC), "2025-12-25 14:30:45 UTC");
    }

    #[test]
    fn test_now_returns_time() {
        let t = now();
        assert!(t.year() >= 2020);
        assert!(t.year() <= 2100);
    }

    #[test]
    fn test_parse_mock_time_format() {
        let valid = ["2025-12-25 14:30:00", "2025-01-01 00:00:00", "2025-12-31 23:59:59"];
        for s in &valid {
            assert!(NaiveDateTime::parse_from_str(s, MOCK_TIME_FORMAT).is_ok(), "{s}");
        }

        let invalid = ["2025-12-25", "14:30:00", "2025-12-25T14:30:00", "", "not a date"];
        for s in &invalid {
            assert!(NaiveDateTime::parse_from_str(s, MOCK_TIME_FORMAT).is_err(), "{s}");
        }
    }
}
