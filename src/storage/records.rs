//! File-per-record corpus
//!
//! Records are stored as pretty JSON under the repository base directory,
//! sharded by year and thousands: `{base}/2023/1xxx/CVE-2023-1275.json`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{Delta, IdRegistry, RecordId, RecordSummary, SummarySource};

/// Store for full record files
pub struct RecordStore {
    base: PathBuf,
    registry: IdRegistry,
}

impl RecordStore {
    pub fn new(base: impl Into<PathBuf>, registry: IdRegistry) -> Self {
        Self {
            base: base.into(),
            registry,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    /// Path of a record file: `{base}/{year}/{bucket}xxx/{id}.json`
    pub fn record_path(&self, id: &RecordId) -> PathBuf {
        self.base.join(format!("{}.json", id.storage_path()))
    }

    /// Writes a full record to its sharded path, returning the identifier
    pub fn write_record(&self, record: &serde_json::Value) -> Result<RecordId> {
        let summary = RecordSummary::from_record(record).context("Record is missing its metadata")?;
        let id = self
            .registry
            .parse(&summary.id)
            .with_context(|| format!("Record has an invalid identifier: '{}'", summary.id))?;

        let path = self.record_path(&id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        record.serialize(&mut ser).context("Failed to serialize record")?;

        let mut file = fs::File::create(&path)
            .with_context(|| format!("Failed to create record file: {}", path.display()))?;
        file.write_all(&buf)
            .with_context(|| format!("Failed to write record file: {}", path.display()))?;

        debug!(%id, path = %path.display(), "wrote record");
        Ok(id)
    }

    /// Reads the summary of a stored record; `None` if it is not stored
    pub fn read_summary(&self, id: &RecordId) -> Result<Option<RecordSummary>> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        read_summary_file(&path).map(Some)
    }

    /// Refreshes every new and updated summary from disk.
    ///
    /// Records that are missing or unreadable keep their current summary.
    /// Returns how many were refreshed.
    pub fn hydrate(&self, delta: &mut Delta) -> usize {
        let mut refreshed = 0;
        delta.hydrate_with(|current| {
            let id = self.registry.parse(&current.id).ok()?;
            match self.read_summary(&id) {
                Ok(Some(summary)) => {
                    refreshed += 1;
                    Some(summary)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(%id, error = %format!("{:#}", e), "keeping stale summary");
                    None
                }
            }
        });
        refreshed
    }

    /// Copies every new and updated record file into `dest`, flat.
    ///
    /// Records not present on disk are skipped. Returns the copied paths.
    pub fn copy_records(&self, delta: &Delta, dest: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create directory: {}", dest.display()))?;

        let mut copied = Vec::new();
        for summary in delta.new_records().iter().chain(delta.updated_records()) {
            let Ok(id) = self.registry.parse(&summary.id) else {
                continue;
            };
            let source = self.record_path(&id);
            if !source.exists() {
                debug!(%id, "record file missing, not copied");
                continue;
            }

            let target = dest.join(format!("{}.json", id));
            fs::copy(&source, &target).with_context(|| {
                format!("Failed to copy {} to {}", source.display(), target.display())
            })?;
            copied.push(target);
        }
        Ok(copied)
    }
}

impl SummarySource for RecordStore {
    /// Reads the record at `path`, falling back to a bare summary
    fn summary(&self, id: &RecordId, path: &Path) -> RecordSummary {
        match read_summary_file(path) {
            Ok(summary) if summary.has_id() => summary,
            _ => RecordSummary::from_id(id),
        }
    }
}

fn read_summary_file(path: &Path) -> Result<RecordSummary> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read record: {}", path.display()))?;
    RecordSummary::from_record_str(&content)
        .with_context(|| format!("Failed to parse record: {}", path.display()))
}
