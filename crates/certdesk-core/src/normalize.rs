//! Input normalisation shared by every record type.

use chrono::{DateTime, SubsecRound, Utc};

/// Split operator-entered comma-separated text into trimmed, non-empty
/// entries, preserving order.
///
/// ```
/// # use certdesk_core::normalize::split_list;
/// assert_eq!(split_list("Go, SQL, ,Testing"), ["Go", "SQL", "Testing"]);
/// assert!(split_list("  ").is_empty());
/// ```
#[must_use]
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Trimmed text, or `None` when it is blank.
#[must_use]
pub fn non_blank(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Names of the required fields whose value is blank.
#[must_use]
pub fn missing_fields<'a>(fields: &[(&'a str, &str)]) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

/// Current time truncated to microseconds, the precision timestamps are
/// stored at.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Serde adapter storing timestamps as fixed-width RFC 3339 with
/// microseconds, so lexicographic order of the stored strings is
/// chronological order.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a timestamp.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    /// Deserialize a timestamp from any RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Fails if the string is not valid RFC 3339.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
