//! Activities: an audit trail of update runs
//!
//! Each run of the updater is one [`Activity`]. Every window frame it
//! fetched becomes an [`ActivityStep`], newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::delta::{Delta, DeltaDocument, LinkTemplate};
use super::time;

/// Step description for frames fetched by modification-date window
pub const STEP_BY_MODIFICATION_WINDOW: &str = "UPDATE_BY_MODIFICATION_DATE_WINDOW";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    Unknown,
    NotStarted,
    InProgress,
    Completed,
    Failed,
}

/// What one frame returned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::iso::option")]
    pub start_window: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::iso::option")]
    pub end_window: Option<DateTime<Utc>>,

    /// Number of records in the frame
    pub count: usize,

    /// Identifiers returned by this frame only; earlier frames may repeat them
    #[serde(default, rename = "cveIds", alias = "recordIds")]
    pub record_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStep {
    pub step_description: String,

    #[serde(with = "time::iso")]
    pub start_time: DateTime<Utc>,

    #[serde(with = "time::iso")]
    pub stop_time: DateTime<Utc>,

    pub duration: String,

    pub summary: StepSummary,
}

impl ActivityStep {
    /// Creates a step timed from `start_time` to now
    pub fn finished(description: impl Into<String>, start_time: DateTime<Utc>, summary: StepSummary) -> Self {
        let stop_time = Utc::now();
        Self {
            step_description: description.into(),
            start_time,
            stop_time,
            duration: format_duration(start_time, stop_time),
            summary,
        }
    }
}

/// One run of the updater
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(with = "time::iso")]
    pub start_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::iso::option")]
    pub stop_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub duration: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default)]
    pub status: ActivityStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<DeltaDocument>,

    #[serde(default)]
    pub steps: Vec<ActivityStep>,
}

impl Activity {
    /// Starts a new activity now
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start_time: Utc::now(),
            stop_time: None,
            duration: String::new(),
            name: name.into(),
            url: None,
            status: ActivityStatus::InProgress,
            errors: Vec::new(),
            delta: None,
            steps: Vec::new(),
        }
    }

    /// Inserts a step at the front, ignoring steps that returned nothing.
    /// Returns true if the step was kept.
    pub fn prepend_step(&mut self, step: ActivityStep) -> bool {
        if step.summary.count == 0 {
            return false;
        }
        self.steps.insert(0, step);
        true
    }

    /// Records the resulting delta and stops the clock
    pub fn finish(&mut self, status: ActivityStatus, delta: Option<&Delta>, links: &LinkTemplate) {
        let stop = Utc::now();
        self.stop_time = Some(stop);
        self.duration = format_duration(self.start_time, stop);
        self.status = status;
        self.delta = delta.map(|d| d.to_document(links));
    }

    /// Number of changes in the recorded delta, or 0
    pub fn number_of_changes(&self) -> usize {
        self.delta.as_ref().map_or(0, |d| d.number_of_changes)
    }
}

/// Newest-first list of activities with the "log always" policy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityLog {
    activities: Vec<Activity>,
    log_always: bool,
}

impl ActivityLog {
    pub fn new(activities: Vec<Activity>, log_always: bool) -> Self {
        Self { activities, log_always }
    }

    /// Prepends an activity if logging always, or if it has steps.
    /// Returns true if the activity was kept.
    pub fn prepend(&mut self, activity: Activity) -> bool {
        if self.log_always || !activity.steps.is_empty() {
            self.activities.insert(0, activity);
            return true;
        }
        false
    }

    /// True if the log should be written back
    pub fn should_write(&self) -> bool {
        self.log_always || !self.activities.is_empty()
    }

    pub fn most_recent(&self) -> Option<&Activity> {
        self.activities.first()
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

fn format_duration(start: DateTime<Utc>, stop: DateTime<Utc>) -> String {
    format!("{} msecs", (stop - start).num_milliseconds().max(0))
}
