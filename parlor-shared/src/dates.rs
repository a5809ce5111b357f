//! Parsing of the date shapes the chat API emits, and the relative labels
//! used by conversation lists and message timelines.
//!
//! The backend is not consistent: depending on the endpoint a timestamp may
//! arrive as `13/01/2026`, `2026-01-13 22:07:50.0`, an ISO-8601 string with
//! or without an offset, or a bare `2026-01-13`. Everything goes through
//! [`parse_api_date`]; anything it does not recognise is an unknown date,
//! never an error.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Date-time layouts tried in order. `%.f` makes the fractional part optional.
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Date-only layouts, interpreted as midnight.
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];

/// Label used for the timeline bucket of messages without a timestamp.
pub const UNKNOWN_DATE_LABEL: &str = "Unknown date";

/// Parse a timestamp string from the API into local wall-clock time.
///
/// Returns `None` for empty or unrecognised input.
#[must_use]
pub fn parse_api_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Local).naive_local());
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Parse an optional API timestamp.
#[must_use]
pub fn parse_optional_date(raw: Option<&str>) -> Option<NaiveDateTime> {
    raw.and_then(parse_api_date)
}

/// Number of calendar days between `day` and `today` (positive when `day` is in the past).
fn days_before(day: NaiveDate, today: NaiveDate) -> i64 {
    today.signed_duration_since(day).num_days()
}

/// Label for a day separator: `Today`, `Yesterday`, the weekday name within
/// the last week, otherwise `dd/mm/yyyy`.
#[must_use]
pub fn day_label(day: NaiveDate, today: NaiveDate) -> String {
    match days_before(day, today) {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=6 => day.format("%A").to_string(),
        _ => day.format("%d/%m/%Y").to_string(),
    }
}

/// Clock time as `HH:mm`.
#[must_use]
pub fn clock_label(at: NaiveDateTime) -> String {
    at.format("%H:%M").to_string()
}

/// Time shown under a message bubble.
///
/// Only the clock time when a day separator already carries the date (or the
/// message is from today); otherwise the day label followed by the clock time.
#[must_use]
pub fn message_time_label(
    at: Option<NaiveDateTime>,
    has_day_separator: bool,
    now: NaiveDateTime,
) -> String {
    let Some(at) = at else {
        return String::new();
    };

    let clock = clock_label(at);
    if has_day_separator || at.date() == now.date() {
        return clock;
    }

    format!("{} {clock}", day_label(at.date(), now.date()))
}

/// Short time shown next to a conversation in the list.
#[must_use]
pub fn list_time_label(at: Option<NaiveDateTime>, now: NaiveDateTime) -> String {
    let Some(at) = at else {
        return String::new();
    };

    match days_before(at.date(), now.date()) {
        0 => clock_label(at),
        1 => "Yesterday".to_string(),
        days @ 2..=6 => format!("{days}d"),
        _ if at.year() == now.year() => at.format("%d/%m").to_string(),
        _ => at.format("%d/%m/%Y").to_string(),
    }
}
