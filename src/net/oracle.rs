//! The record oracle seam
//!
//! Anything that can report how many records changed in a window, and
//! return them, can drive the window fetcher. Tests use in-memory fakes.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::RecordSummary;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Record service unavailable: {0}")]
    Unavailable(String),

    #[error("Record service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode record service response: {0}")]
    Decode(String),
}

/// One record returned by a fetch
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRecord {
    pub summary: RecordSummary,
    /// Full record as served, when the oracle returns full records
    pub raw: Option<serde_json::Value>,
}

impl OracleRecord {
    /// A record known only by its summary
    pub fn summary_only(summary: RecordSummary) -> Self {
        Self { summary, raw: None }
    }
}

/// Source of truth for which records changed when
///
/// Windows are half-open: `[start, end)`. Failures are returned as-is;
/// retrying is the implementation's business.
pub trait RecordOracle {
    /// Number of records modified in the window
    fn count_in_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64, OracleError>;

    /// Records modified in the window
    fn fetch_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OracleRecord>, OracleError>;
}
