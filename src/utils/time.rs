//! Time utilities: zone parsing, calendar-day arithmetic and injectable clocks

use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;

use crate::errors::{AppError, AppResult};

/// Parse a named IANA time zone such as `Europe/London` or `UTC`
pub fn parse_timezone(tz_str: &str) -> AppResult<Tz> {
    tz_str.trim().parse::<Tz>().map_err(|_| {
        AppError::configuration(format!(
            "Invalid timezone: '{tz_str}'. Use a named timezone (e.g., 'Europe/London')"
        ))
    })
}

/// Resolve a wall-clock time in `tz` to a UTC instant.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant; times that do
/// not exist (DST spring-forward) are read as if the pre-transition offset still
/// applied, which lands just after the gap.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let offset = tz.offset_from_utc_datetime(&naive).fix();
            offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
        }
    }
}

/// Calendar date of `instant` as seen in `tz`
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// `date` at `time` in `tz`, as UTC
pub fn at_local_time(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    localize(date.and_time(time), tz)
}

/// 00:00:00 of `instant`'s calendar day in `tz`, shifted forward by `days` calendar days
pub fn midnight_plus_days(instant: DateTime<Utc>, days: u32, tz: Tz) -> DateTime<Utc> {
    let date = shift_days(local_date(instant, tz), days);
    at_local_time(date, NaiveTime::MIN, tz)
}

pub fn shift_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Format datetime for display in the given zone
pub fn format_for_display(utc_time: DateTime<Utc>, tz: Tz) -> String {
    let local_time = utc_time.with_timezone(&tz);
    format!("{} {}", local_time.format("%Y-%m-%d %H:%M:%S"), tz.name())
}

/// Source of "now" for components that must be testable without wall-clock waits
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
