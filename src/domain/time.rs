//! ISO-8601 timestamp helpers
//!
//! Every timestamp written by this crate uses one shape:
//! `YYYY-MM-DDTHH:MM:SS.sssZ` (UTC, millisecond precision).
//!
//! Parsing is strict about layout but accepts the variants found in
//! published records: optional fractional seconds, optional seconds,
//! `Z` or `±hh:mm` zones, and (when asked) a missing zone read as UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TimeError {
    #[error("Invalid ISO timestamp: '{0}'")]
    InvalidTimestamp(String),

    #[error("{amount} {unit} before {} is out of range", to_iso(.from))]
    OutOfRange {
        from: DateTime<Utc>,
        amount: i64,
        unit: &'static str,
    },
}

const BODY_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Renders a timestamp as `YYYY-MM-DDTHH:MM:SS.sssZ`
pub fn to_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an ISO timestamp with an explicit zone
pub fn parse_iso(s: &str) -> Result<DateTime<Utc>, TimeError> {
    parse_iso_with(s, false)
}

/// Parses an ISO timestamp, optionally reading a missing zone as UTC
pub fn parse_iso_with(s: &str, assume_z: bool) -> Result<DateTime<Utc>, TimeError> {
    let s = s.trim();
    let invalid = || TimeError::InvalidTimestamp(s.to_string());

    let (body, offset) = match split_zone(s) {
        Some(parts) => parts,
        None if assume_z => (s, Some(FixedOffset::east_opt(0).ok_or_else(invalid)?)),
        None => return Err(invalid()),
    };
    let offset = offset.ok_or_else(invalid)?;

    let naive = BODY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(body, fmt).ok())
        .ok_or_else(invalid)?;

    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// Splits `s` into its date-time body and zone offset.
/// Returns `Some((body, None))` when a zone is present but malformed.
fn split_zone(s: &str) -> Option<(&str, Option<FixedOffset>)> {
    if let Some(body) = s.strip_suffix('Z') {
        return Some((body, FixedOffset::east_opt(0)));
    }

    if s.len() <= 6 || !s.is_char_boundary(s.len() - 6) {
        return None;
    }
    let (body, zone) = s.split_at(s.len() - 6);
    let bytes = zone.as_bytes();
    if !matches!(bytes[0], b'+' | b'-') || bytes[3] != b':' || !body.contains('T') {
        return None;
    }

    let hours: i32 = zone[1..3].parse().ok()?;
    let minutes: i32 = zone[4..6].parse().ok()?;
    let seconds = hours * 3600 + minutes * 60;
    let offset = if bytes[0] == b'-' {
        FixedOffset::west_opt(seconds)
    } else {
        FixedOffset::east_opt(seconds)
    };
    Some((body, offset))
}

/// Returns today's UTC midnight
pub fn midnight_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or(now)
}

/// Returns `now` shifted back by `days`
pub fn days_ago(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, TimeError> {
    TimeDelta::try_days(days)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or(TimeError::OutOfRange { from: now, amount: days, unit: "days" })
}

/// Returns `now` shifted back by `minutes`
pub fn minutes_ago(now: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>, TimeError> {
    TimeDelta::try_minutes(minutes)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or(TimeError::OutOfRange { from: now, amount: minutes, unit: "minutes" })
}

/// Serde adapter writing timestamps in the canonical ISO shape.
///
/// Deserialization is lenient about a missing zone, since published
/// records sometimes omit the trailing `Z`.
pub mod iso {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::to_iso(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_iso_with(&raw, true).map_err(serde::de::Error::custom)
    }

    /// Same as the parent module, for `Option<DateTime<Utc>>` fields
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match ts {
                Some(ts) => serializer.serialize_str(&crate::domain::time::to_iso(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            match raw.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(s) => crate::domain::time::parse_iso_with(s, true)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}
