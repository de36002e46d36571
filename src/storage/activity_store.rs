//! Persistence for the activity log

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use super::atomic::{read_if_present, write_atomic};
use crate::domain::{Activity, ActivityLog};

/// Store for the recent-activities file
pub struct ActivityLogStore {
    path: PathBuf,
    log_always: bool,
}

impl ActivityLogStore {
    pub fn new(path: impl Into<PathBuf>, log_always: bool) -> Self {
        Self {
            path: path.into(),
            log_always,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads previous activities; a missing or blank file is an empty log
    pub fn load(&self) -> Result<ActivityLog> {
        let activities: Vec<Activity> = match read_if_present(&self.path)? {
            Some(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse activity log: {}", self.path.display()))?,
            None => Vec::new(),
        };
        Ok(ActivityLog::new(activities, self.log_always))
    }

    /// Writes the log when its policy allows; returns whether it was written
    pub fn persist(&self, log: &ActivityLog) -> Result<bool> {
        if !log.should_write() {
            info!(path = %self.path.display(), written = false, "activity log unchanged");
            return Ok(false);
        }

        let json = serde_json::to_string_pretty(log.activities()).context("Failed to serialize activity log")?;
        write_atomic(&self.path, json.as_bytes())?;

        info!(path = %self.path.display(), entries = log.len(), written = true, "wrote activity log");
        Ok(true)
    }
}
