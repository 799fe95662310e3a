//! Timestamp helpers shared by the item model, the feed engine and storage.
//!
//! # Invariants
//! - Every timestamp handled by core is UTC with millisecond precision.
//! - Wire format is RFC 3339 with exactly three fractional digits and `Z`.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};

/// Current time truncated to millisecond precision.
pub fn now_millis() -> DateTime<Utc> {
    truncate_millis(Utc::now())
}

/// Drops sub-millisecond precision so values survive a storage round trip.
pub fn truncate_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    from_epoch_millis(value.timestamp_millis()).unwrap_or(value)
}

/// Converts epoch milliseconds into a UTC timestamp.
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Parses a client supplied item date, truncated to milliseconds.
///
/// Accepts RFC 3339 (`2023-01-02T00:00:00Z`, offsets allowed) and bare dates
/// (`2023-01-02`, read as midnight UTC). Returns `None` for anything else.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    parse_timestamp_exact(value).map(truncate_millis)
}

/// Same formats as [`parse_timestamp`], keeping sub-millisecond digits.
///
/// Used for feed cursors, which compare against stored dates and must not
/// move when rounded.
pub fn parse_timestamp_exact(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Formats a timestamp in the canonical wire form.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Serde adapter for required timestamp fields.
pub mod rfc3339 {
    use super::{format_timestamp, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`")))
    }
}

/// Serde adapter for nullable timestamp fields. `None` is written as `null`.
pub mod rfc3339_opt {
    use super::{format_timestamp, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&format_timestamp(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`"))),
            None => Ok(None),
        }
    }
}
