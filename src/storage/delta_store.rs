//! Persistence for deltas and the delta log
//!
//! The log is a JSON array of delta documents, newest first:
//!
//! ```json
//! [
//!   {
//!     "fetchTime": "2023-02-16T03:00:00.000Z",
//!     "numberOfChanges": 1,
//!     "new": [{ "identifier": "CVE-2023-1275", "externalViewLink": "...", "externalRawLink": "..." }],
//!     "updated": [],
//!     "unknown": []
//!   }
//! ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::atomic::{read_if_present, write_atomic};
use crate::domain::time::{days_ago, to_iso};
use crate::domain::{Delta, DeltaDocument, DeltaLog, LinkTemplate};

/// Text written to release notes when nothing changed
pub const NO_CHANGES_TEXT: &str = "no files were changed";

/// Store for the delta log file
pub struct DeltaLogStore {
    path: PathBuf,
    retention_days: i64,
    links: LinkTemplate,
}

impl DeltaLogStore {
    pub fn new(path: impl Into<PathBuf>, retention_days: i64, links: LinkTemplate) -> Self {
        Self {
            path: path.into(),
            retention_days,
            links,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default pruning threshold: now minus the retention period
    pub fn default_threshold(&self) -> Result<DateTime<Utc>> {
        days_ago(Utc::now(), self.retention_days).context("Invalid delta log retention")
    }

    /// Reads the log, dropping entries fetched before the threshold.
    ///
    /// A missing or blank file is an empty log.
    pub fn load(&self, prune_older_than: Option<DateTime<Utc>>) -> Result<DeltaLog> {
        let Some(content) = read_if_present(&self.path)? else {
            debug!(path = %self.path.display(), "no delta log yet");
            return Ok(DeltaLog::new());
        };

        let documents: Vec<DeltaDocument> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse delta log: {}", self.path.display()))?;

        let mut log = DeltaLog::from_entries(documents.into_iter().map(Delta::from_document).collect());

        let threshold = match prune_older_than {
            Some(threshold) => threshold,
            None => self.default_threshold()?,
        };
        let dropped = log.prune_older_than(threshold);
        debug!(threshold = %to_iso(&threshold), dropped, kept = log.len(), "pruned delta log");

        Ok(log)
    }

    /// Writes the log if its newest entry recorded any change.
    ///
    /// Returns whether the file was written.
    pub fn persist(&self, log: &DeltaLog) -> Result<bool> {
        let documents: Vec<DeltaDocument> = log.iter().map(|d| d.to_document(&self.links)).collect();
        let has_changes = documents.first().is_some_and(|d| d.number_of_changes > 0);
        if !has_changes {
            info!(path = %self.path.display(), written = false, "delta log unchanged");
            return Ok(false);
        }

        let json = serde_json::to_string_pretty(&documents).context("Failed to serialize delta log")?;
        write_atomic(&self.path, json.as_bytes())?;

        info!(path = %self.path.display(), entries = log.len(), written = true, "wrote delta log");
        Ok(true)
    }
}

/// Writes one delta as JSON, stamping its fetch time if unset
pub fn write_delta_file(delta: &mut Delta, path: &Path, links: &LinkTemplate) -> Result<()> {
    if delta.fetch_time.is_none() {
        delta.fetch_time = Some(Utc::now());
    }

    let json = serde_json::to_string_pretty(&delta.to_document(links)).context("Failed to serialize delta")?;
    write_atomic(path, json.as_bytes())
}

/// Writes the delta summary as release notes
pub fn write_release_notes(delta: &Delta, path: &Path) -> Result<()> {
    let text = if delta.is_empty() {
        NO_CHANGES_TEXT.to_string()
    } else {
        delta.summarize()
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("Failed to write release notes: {}", path.display()))
}
