//! Date/time utilities.
//!
//! Timestamps are stored in SQLite as UTC text in `YYYY-MM-DD HH:MM:SS` form.

use chrono::{NaiveDate, NaiveDateTime, Utc};

/// Storage format used for every timestamp column.
pub const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time in storage format.
pub fn now_sql() -> String {
    Utc::now().format(SQL_DATETIME_FORMAT).to_string()
}

/// Convert a database datetime string (YYYY-MM-DD HH:MM:SS) to RFC3339 format.
///
/// The database stores times in UTC, so a `Z` suffix is appended.
/// Strings that already carry a `T` separator are returned unchanged.
pub fn to_rfc3339(datetime_str: &str) -> String {
    if datetime_str.contains('T') {
        return datetime_str.to_string();
    }
    format!("{}Z", datetime_str.replace(' ', "T"))
}

/// Parse a stored timestamp.
pub fn parse_sql(datetime_str: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(datetime_str, SQL_DATETIME_FORMAT).ok()
}

/// Inclusive bounds covering whole days `from..=to`, in storage format.
///
/// Returns `None` when `from` is after `to`.
pub fn day_range_bounds(from: NaiveDate, to: NaiveDate) -> Option<(String, String)> {
    if from > to {
        return None;
    }
    let start = from.and_hms_opt(0, 0, 0)?;
    let end = to.and_hms_opt(23, 59, 59)?;
    Some((
        start.format(SQL_DATETIME_FORMAT).to_string(),
        end.format(SQL_DATETIME_FORMAT).to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_rfc3339() {
        assert_eq!(to_rfc3339("2024-01-15 10:30:00"), "2024-01-15T10:30:00Z");
    }

    #[test]
    fn test_to_rfc3339_passthrough() {
        assert_eq!(to_rfc3339("2024-01-15T10:30:00Z"), "2024-01-15T10:30:00Z");
    }

    #[test]
    fn test_now_sql_roundtrips() {
        let now = now_sql();
        assert!(parse_sql(&now).is_some());
        assert_eq!(now.len(), 19);
    }

    #[test]
    fn test_parse_sql_invalid() {
        assert!(parse_sql("yesterday").is_none());
    }

    #[test]
    fn test_day_range_bounds() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let (start, end) = day_range_bounds(from, to).unwrap();
        assert_eq!(start, "2024-03-01 00:00:00");
        assert_eq!(end, "2024-03-02 23:59:59");
    }

    #[test]
    fn test_day_range_bounds_reversed() {
        let from = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(day_range_bounds(from, to).is_none());
    }
}
