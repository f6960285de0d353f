//! Timestamp utilities
//!
//! Timestamps are written to SQLite as fixed-width RFC 3339 strings so that
//! lexical ordering in SQL matches chronological ordering.

use chrono::{DateTime, Months, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds since the Unix epoch, used to make object paths unique
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Add calendar months, clamping to the end of shorter months
pub fn add_months(at: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    at.checked_add_months(Months::new(months)).unwrap_or(at)
}

/// Format a timestamp for storage
pub fn to_db(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Corrupt timestamp '{}' in database: {}", value, e)))
}
