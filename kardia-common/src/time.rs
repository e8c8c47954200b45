//! Timestamp utilities
//!
//! The metadata store records dates as seconds relative to the Core Data reference
//! date (2001-01-01T00:00:00Z). Adding [`CORE_DATA_EPOCH_OFFSET_SECS`] yields a Unix
//! timestamp.

use chrono::{DateTime, SecondsFormat, Utc};

/// Seconds between 1970-01-01T00:00:00Z and 2001-01-01T00:00:00Z
pub const CORE_DATA_EPOCH_OFFSET_SECS: i64 = 978_307_200;

/// Convert a stored Core Data offset to a UTC timestamp
///
/// Returns `None` when the result is outside chrono's representable range.
pub fn from_core_data_offset(offset_secs: i64) -> Option<DateTime<Utc>> {
    let unix = offset_secs.checked_add(CORE_DATA_EPOCH_OFFSET_SECS)?;
    DateTime::from_timestamp(unix, 0)
}

/// Render a stored Core Data offset as an RFC 3339 string (`""` when out of range)
pub fn format_core_data_offset(offset_secs: i64) -> String {
    from_core_data_offset(offset_secs)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_offset_is_reference_date() {
        let t = from_core_data_offset(0).unwrap();
        assert_eq!(t.to_rfc3339_opts(SecondsFormat::Secs, true), "2001-01-01T00:00:00Z");
    }

    #[test]
    fn test_known_offset() {
        // 2019-06-01T12:00:00Z
        assert_eq!(format_core_data_offset(581_083_200), "2019-06-01T12:00:00Z");
    }

    #[test]
    fn test_overflow_yields_empty_string() {
        assert_eq!(format_core_data_offset(i64::MAX), "");
        assert!(from_core_data_offset(i64::MAX).is_none());
    }
}
