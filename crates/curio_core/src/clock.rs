//! Wall-clock helpers shared by aggregates and storage.
//!
//! # Invariants
//! - Every timestamp produced here has millisecond precision, so it survives
//!   an epoch-millisecond round trip through SQLite unchanged.

use chrono::{DateTime, DurationRound, TimeDelta, TimeZone, Utc};

/// Returns current UTC time truncated to whole milliseconds.
pub fn now_utc() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

/// Drops sub-millisecond precision from `value`.
pub fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    value
        .duration_trunc(TimeDelta::milliseconds(1))
        .unwrap_or(value)
}

/// Converts a UTC timestamp to epoch milliseconds.
pub fn to_epoch_ms(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

/// Converts epoch milliseconds back to a UTC timestamp.
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn from_epoch_ms(value: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(value).single()
}
