//! Timestamp helpers for values stored by SQLite's `datetime('now')`.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Format used by SQLite's `datetime()` function.
pub const SQLITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a database timestamp (UTC, `YYYY-MM-DD HH:MM:SS`).
///
/// RFC3339 input is accepted as well. Returns `None` for anything else.
pub fn parse_db_datetime(datetime_str: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(datetime_str, SQLITE_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(datetime_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a UTC time the way SQLite stores it.
pub fn to_db_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(SQLITE_FORMAT).to_string()
}

/// Convert a database datetime string to RFC3339 for API responses.
pub fn to_rfc3339(datetime_str: &str) -> String {
    match parse_db_datetime(datetime_str) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => datetime_str.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_sqlite_format() {
        let dt = parse_db_datetime("2024-01-15 10:30:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse_db_datetime("2024-01-15T19:30:00+09:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_db_datetime("not a date").is_none());
    }

    #[test]
    fn test_to_db_datetime() {
        let dt = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(to_db_datetime(&dt), "2024-12-31 23:59:59");
    }

    #[test]
    fn test_to_rfc3339() {
        assert_eq!(to_rfc3339("2024-01-15 10:30:00"), "2024-01-15T10:30:00Z");
    }

    #[test]
    fn test_to_rfc3339_passthrough_on_garbage() {
        assert_eq!(to_rfc3339("garbage"), "garbage");
    }
}
