//! Record service wire types
//!
//! Requests are `GET {base}/api/cve?{query}` where the query selects a
//! modification window:
//!
//! ```text
//! count_only=1&time_modified.gt=2023-02-15T23:59:59.999Z&time_modified.lt=2023-02-16T03:00:00.000Z
//! ```
//!
//! The service only offers exclusive bounds. Timestamps are millisecond
//! precision, so `[start, end)` is sent as `gt = start - 1ms`, `lt = end`.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::time;

/// Path of the record endpoint, relative to the service base URL
pub const RECORD_ENDPOINT: &str = "api/cve";

/// A modification-time window query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count_only: bool,
}

impl WindowQuery {
    pub fn count(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end, count_only: true }
    }

    pub fn fetch(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end, count_only: false }
    }

    /// Exclusive lower bound that admits records modified at `start`
    pub fn after(&self) -> DateTime<Utc> {
        let one_ms = TimeDelta::milliseconds(1);
        let start = self.start.duration_trunc(one_ms).unwrap_or(self.start);
        start.checked_sub_signed(one_ms).unwrap_or(start)
    }

    /// Query parameters in the order the service documents them
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(3);
        if self.count_only {
            params.push(("count_only", "1".to_string()));
        }
        params.push(("time_modified.gt", time::to_iso(&self.after())));
        params.push(("time_modified.lt", time::to_iso(&self.end)));
        params
    }

    /// Query string, unescaped (ISO timestamps need no escaping)
    pub fn query_string(&self) -> String {
        self.params()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Response to a `count_only` query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResponse {
    /// Some deployments send the count as a string
    #[serde(deserialize_with = "number_or_string")]
    pub total_count: u64,
}

/// Response to a record query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<serde_json::Value>,

    #[serde(default, rename = "cveRecords", alias = "records")]
    pub records: Vec<serde_json::Value>,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
