//! # Date Handling Utilities
//!
//! Provider catalogs disagree on how they write dates: full RFC 3339
//! timestamps, naive date-times, bare dates and compact forms all appear in
//! the wild. This module parses all of them into UTC and renders the canonical
//! ISO 8601 form used in product metadata.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%S",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parses a date or date-time string into a UTC timestamp.
///
/// Values with an explicit offset are converted to UTC; values without one
/// are assumed to already be UTC. Bare dates resolve to midnight.
///
/// # Arguments
/// * `text` - The date string as returned by a provider
///
/// # Returns
/// `Some(DateTime<Utc>)` if one of the supported layouts matches, `None` otherwise
///
/// # Example
/// ```rust
/// use eogate_util::date_handling::parse_datetime_utc;
///
/// let parsed = parse_datetime_utc("2021-04-21T00:00:00+02:00").unwrap();
/// assert_eq!(parsed.timestamp_millis(), 1618956000000);
///
/// let midnight = parse_datetime_utc("2021-04-21").unwrap();
/// assert_eq!(midnight.timestamp_millis(), 1618963200000);
///
/// assert!(parse_datetime_utc("yesterday").is_none());
/// ```
pub fn parse_datetime_utc(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Some(date_time.with_timezone(&Utc));
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(date_time) = DateTime::parse_from_str(text, format) {
            return Some(date_time.with_timezone(&Utc));
        }
    }
    let naive_text = text.strip_suffix('Z').unwrap_or(text);
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive_text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for format in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(naive_text, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Renders a UTC timestamp as ISO 8601 with millisecond precision and a `Z`
/// suffix, e.g. `2021-04-21T18:27:19.123Z`.
pub fn format_iso_utc_millis(date_time: &DateTime<Utc>) -> String {
    date_time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Converts Unix milliseconds to a UTC timestamp.
///
/// # Example
/// ```rust
/// use eogate_util::date_handling::{datetime_from_millis, format_iso_utc_millis};
///
/// let date_time = datetime_from_millis(1619029639123).unwrap();
/// assert_eq!(format_iso_utc_millis(&date_time), "2021-04-21T18:27:19.123Z");
/// ```
pub fn datetime_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fractional_zulu_timestamps() {
        let parsed = parse_datetime_utc("2021-04-21T18:27:19.123Z").expect("parse zulu");
        assert_eq!(parsed.timestamp_millis(), 1619029639123);
    }

    #[test]
    fn treats_naive_values_as_utc() {
        let parsed = parse_datetime_utc("2021-04-21T18:27:19").expect("parse naive");
        assert_eq!(format_iso_utc_millis(&parsed), "2021-04-21T18:27:19.000Z");
        let spaced = parse_datetime_utc("2021-04-21 18:27:19.5").expect("parse spaced");
        assert_eq!(format_iso_utc_millis(&spaced), "2021-04-21T18:27:19.500Z");
    }

    #[test]
    fn converts_offsets_without_colon() {
        let parsed = parse_datetime_utc("2021-04-21T00:00:00.000+0600").expect("parse offset");
        assert_eq!(format_iso_utc_millis(&parsed), "2021-04-20T18:00:00.000Z");
    }

    #[test]
    fn parses_compact_layouts() {
        let parsed = parse_datetime_utc("20210421T182719").expect("parse compact");
        assert_eq!(format_iso_utc_millis(&parsed), "2021-04-21T18:27:19.000Z");
        let date = parse_datetime_utc("20210421").expect("parse compact date");
        assert_eq!(format_iso_utc_millis(&date), "2021-04-21T00:00:00.000Z");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_datetime_utc("").is_none());
        assert!(parse_datetime_utc("2021-13-45").is_none());
    }
}
