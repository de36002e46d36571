//! Record summaries
//!
//! A [`RecordSummary`] holds the subset of a full record needed to report
//! a change: identifier, lifecycle state, key timestamps and a short
//! description. Summaries are replaced wholesale, never patched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::RecordId;
use super::time;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Record has no metadata section")]
    MissingMetadata,

    #[error("Failed to decode record: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Lifecycle state of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordState {
    Reserved,
    Published,
    Rejected,
    Other(String),
}

impl From<String> for RecordState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "RESERVED" => RecordState::Reserved,
            "PUBLISHED" => RecordState::Published,
            "REJECTED" => RecordState::Rejected,
            _ => RecordState::Other(value),
        }
    }
}

impl From<RecordState> for String {
    fn from(state: RecordState) -> Self {
        match state {
            RecordState::Reserved => "RESERVED".to_string(),
            RecordState::Published => "PUBLISHED".to_string(),
            RecordState::Rejected => "REJECTED".to_string(),
            RecordState::Other(s) => s,
        }
    }
}

/// Metadata block of a full record, as published
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordMetadata {
    #[serde(default, alias = "cveId")]
    id: String,
    state: Option<RecordState>,
    assigner_org_id: Option<String>,
    assigner_short_name: Option<String>,
    #[serde(default, with = "time::iso::option")]
    date_reserved: Option<DateTime<Utc>>,
    #[serde(default, with = "time::iso::option")]
    date_published: Option<DateTime<Utc>>,
    #[serde(default, with = "time::iso::option")]
    date_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct Description {
    #[serde(default)]
    lang: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CnaContainer {
    #[serde(default)]
    descriptions: Vec<Description>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Containers {
    #[serde(default)]
    cna: Option<CnaContainer>,
}

/// Shape of a full record; everything else in it is ignored here
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullRecord {
    #[serde(alias = "cveMetadata")]
    metadata: Option<RecordMetadata>,
    #[serde(default)]
    containers: Containers,
}

/// Minimal metadata describing one changed record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    /// Record identifier; may be empty when a caller could not resolve one
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RecordState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigner_org_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigner_short_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::iso::option")]
    pub date_reserved: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::iso::option")]
    pub date_published: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::iso::option")]
    pub date_updated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RecordSummary {
    /// Creates a bare summary that only knows its identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Creates a bare summary for a parsed identifier
    pub fn from_id(id: &RecordId) -> Self {
        Self::new(id.to_string())
    }

    /// Sets the last-updated timestamp (builder style)
    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.date_updated = Some(at);
        self
    }

    /// Builds a summary from a full record document
    pub fn from_record(record: &serde_json::Value) -> Result<Self, RecordError> {
        let full = FullRecord::deserialize(record)?;
        let metadata = full.metadata.ok_or(RecordError::MissingMetadata)?;

        let description = full
            .containers
            .cna
            .and_then(|cna| pick_description(cna.descriptions));

        Ok(Self {
            id: metadata.id,
            state: metadata.state,
            assigner_org_id: metadata.assigner_org_id,
            assigner_short_name: metadata.assigner_short_name,
            date_reserved: metadata.date_reserved,
            date_published: metadata.date_published,
            date_updated: metadata.date_updated,
            description,
        })
    }

    /// Builds a summary from the text of a full record file
    pub fn from_record_str(json: &str) -> Result<Self, RecordError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_record(&value)
    }

    /// Returns true if the summary carries an identifier
    pub fn has_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Returns the most recent of the known timestamps
    pub fn last_changed(&self) -> Option<DateTime<Utc>> {
        [self.date_updated, self.date_published, self.date_reserved]
            .into_iter()
            .flatten()
            .max()
    }
}

/// Picks the English description, falling back to the first one
fn pick_description(descriptions: Vec<Description>) -> Option<String> {
    let position = descriptions
        .iter()
        .position(|d| d.lang.to_ascii_lowercase().starts_with("en"))
        .or(if descriptions.is_empty() { None } else { Some(0) })?;
    descriptions
        .into_iter()
        .nth(position)
        .map(|d| d.value)
        .filter(|v| !v.is_empty())
}
