//! Tick arithmetic for temporal comparisons
//!
//! A tick is 100 nanoseconds. Tick counts start at `0001-01-01T00:00:00Z`,
//! which places every day boundary on an exact multiple of [`TICKS_PER_DAY`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

pub const TICKS_PER_SECOND: i64 = 10_000_000;
pub const TICKS_PER_MINUTE: i64 = 60 * TICKS_PER_SECOND;
pub const TICKS_PER_DAY: i64 = 86_400 * TICKS_PER_SECOND;

/// Ticks at the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Convert a UTC timestamp to ticks. `None` past the tick range (about year 29,000).
pub fn to_ticks(at: DateTime<Utc>) -> Option<i64> {
    at.timestamp()
        .checked_mul(TICKS_PER_SECOND)?
        .checked_add(i64::from(at.timestamp_subsec_nanos() / 100))?
        .checked_add(UNIX_EPOCH_TICKS)
}

/// First tick of the given calendar day (UTC).
pub fn start_of_day_ticks(date: NaiveDate) -> Option<i64> {
    to_ticks(date.and_time(NaiveTime::MIN).and_utc())
}

/// Last tick of the given calendar day (UTC).
pub fn end_of_day_ticks(date: NaiveDate) -> Option<i64> {
    start_of_day_ticks(date)?.checked_add(TICKS_PER_DAY - 1)
}

/// First tick of the day containing `ticks`.
pub fn floor_to_day(ticks: i64) -> Option<i64> {
    ticks.checked_sub(ticks.rem_euclid(TICKS_PER_DAY))
}

/// Last tick of the day containing `ticks`.
pub fn ceil_to_day_end(ticks: i64) -> Option<i64> {
    floor_to_day(ticks)?.checked_add(TICKS_PER_DAY - 1)
}

/// Time of day encoded in a tick count.
pub fn time_of_day_from_ticks(ticks: i64) -> Option<NaiveTime> {
    let within_day = ticks.rem_euclid(TICKS_PER_DAY);
    let secs = (within_day / TICKS_PER_SECOND) as u32;
    let nanos = ((within_day % TICKS_PER_SECOND) * 100) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

/// Parse free-form text as a date-time offset and normalise it to UTC.
///
/// Accepts RFC 3339, RFC 2822, offset-less date-times (taken as UTC) and bare
/// dates (midnight UTC).
pub fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Parse free-form text as a time of day (`HH:MM`, `HH:MM:SS`, fractional seconds).
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
}
