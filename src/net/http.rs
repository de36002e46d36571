//! HTTP record oracle backed by the record service
//!
//! Uses a blocking client: the fetcher issues one request at a time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::oracle::{OracleError, OracleRecord, RecordOracle};
use super::protocol::{CountResponse, RecordsResponse, WindowQuery, RECORD_ENDPOINT};
use crate::domain::RecordSummary;

/// Oracle that queries the record service over HTTP
pub struct HttpOracle {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpOracle {
    /// Creates an oracle for the service at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/{}", base_url.trim_end_matches('/'), RECORD_ENDPOINT),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn get(&self, query: &WindowQuery) -> Result<reqwest::blocking::Response, OracleError> {
        debug!(endpoint = %self.endpoint, query = %query.query_string(), "querying record service");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query.params())
            .send()
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl RecordOracle for HttpOracle {
    fn count_in_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64, OracleError> {
        let response: CountResponse = self
            .get(&WindowQuery::count(start, end))?
            .json()
            .map_err(|e| OracleError::Decode(e.to_string()))?;
        Ok(response.total_count)
    }

    fn fetch_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OracleRecord>, OracleError> {
        let response: RecordsResponse = self
            .get(&WindowQuery::fetch(start, end))?
            .json()
            .map_err(|e| OracleError::Decode(e.to_string()))?;

        response
            .records
            .into_iter()
            .map(|raw| {
                let summary =
                    RecordSummary::from_record(&raw).map_err(|e| OracleError::Decode(e.to_string()))?;
                Ok(OracleRecord { summary, raw: Some(raw) })
            })
            .collect()
    }
}
