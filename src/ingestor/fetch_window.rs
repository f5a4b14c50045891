//! Fetch-window cadence.
//!
//! The very first harvest pulls everything from shortly after "now" up to the
//! horizon; every later harvest only pulls the single day that has just come
//! within the horizon.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono_tz::Tz;

use crate::config::defaults::FIRST_RUN_LEAD_HOURS;
use crate::models::FetchWindow;
use crate::utils::time::{at_local_time, local_date, midnight_plus_days, shift_days};

/// Compute the provider fetch window for one channel.
///
/// * first run: `[now + 2h, midnight(now) + horizon_days)`, with the start
///   clamped to the end when the lead runs past a short horizon
/// * later runs: `[midnight(now) + horizon_days, that day 23:59:59]`
///
/// `midnight` and day arithmetic are evaluated on the calendar of `tz`.
pub fn compute_window(
    now: DateTime<Utc>,
    is_first_run: bool,
    horizon_days: u32,
    tz: Tz,
) -> FetchWindow {
    let horizon_start = midnight_plus_days(now, horizon_days, tz);

    if is_first_run {
        FetchWindow {
            start: (now + Duration::hours(FIRST_RUN_LEAD_HOURS)).min(horizon_start),
            end: horizon_start,
        }
    } else {
        let horizon_day = shift_days(local_date(now, tz), horizon_days);
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        FetchWindow {
            start: horizon_start,
            end: at_local_time(horizon_day, last_second, tz),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[rstest]
    #[case(true, "2023-01-01T10:00:00Z", "2023-01-15T00:00:00Z")]
    #[case(false, "2023-01-15T00:00:00Z", "2023-01-15T23:59:59Z")]
    fn test_window_for_cadence(#[case] first_run: bool, #[case] start: &str, #[case] end: &str) {
        let window = compute_window(utc("2023-01-01T08:00:00Z"), first_run, 14, chrono_tz::UTC);
        assert_eq!(window.start, utc(start));
        assert_eq!(window.end, utc(end));
    }

    #[test]
    fn test_window_is_deterministic() {
        let now = utc("2023-05-05T21:59:00Z");
        let a = compute_window(now, false, 14, chrono_tz::Europe::London);
        let b = compute_window(now, false, 14, chrono_tz::Europe::London);
        assert_eq!(a, b);
    }

    #[test]
    fn test_window_follows_local_calendar() {
        // 22:00 UTC on 5 May is 23:00 BST, still 5 May in London
        let window = compute_window(utc("2023-05-05T22:00:00Z"), false, 14, chrono_tz::Europe::London);
        assert_eq!(window.start, utc("2023-05-18T23:00:00Z"));
        assert_eq!(window.end, utc("2023-05-19T22:59:59Z"));
        assert_eq!(window.start_iso(), "2023-05-18T23:00:00Z");
    }

    #[test]
    fn test_first_run_end_matches_steady_state_start() {
        let now = utc("2023-01-01T08:00:00Z");
        let first = compute_window(now, true, 7, chrono_tz::UTC);
        let steady = compute_window(now, false, 7, chrono_tz::UTC);
        assert_eq!(first.end, steady.start);
    }

    #[rstest]
    #[case("2023-01-01T21:00:00Z", "2023-01-01T23:00:00Z")]
    #[case("2023-01-01T22:30:00Z", "2023-01-02T00:00:00Z")]
    #[case("2023-01-01T23:59:00Z", "2023-01-02T00:00:00Z")]
    fn test_first_run_start_never_passes_short_horizon(#[case] now: &str, #[case] start: &str) {
        let window = compute_window(utc(now), true, 1, chrono_tz::UTC);
        assert_eq!(window.start, utc(start));
        assert_eq!(window.end, utc("2023-01-02T00:00:00Z"));
        assert!(window.start <= window.end);
    }
}
