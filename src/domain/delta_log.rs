//! Delta log: a newest-first history of deltas
//!
//! The log itself is plain data. Reading and writing it (with retention
//! and the write-only-if-changed rule) lives in the storage layer.

use chrono::{DateTime, Utc};

use super::delta::Delta;

/// Order used by [`DeltaLog::sort_by_fetch_time`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Most recent fetch first (the persisted order)
    #[default]
    LatestFirst,
    /// Oldest fetch first
    LatestLast,
}

/// Ordered history of deltas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaLog {
    entries: Vec<Delta>,
}

impl DeltaLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a log from entries already in newest-first order
    pub fn from_entries(entries: Vec<Delta>) -> Self {
        Self { entries }
    }

    /// Inserts a delta at the front.
    ///
    /// Callers keep the newest-first order; timestamps are not compared.
    pub fn prepend(&mut self, delta: Delta) {
        self.entries.insert(0, delta);
    }

    /// Stable sort by fetch time.
    ///
    /// Entries without a fetch time sort as if fetched now; the entries
    /// themselves are left untouched.
    pub fn sort_by_fetch_time(&mut self, direction: SortDirection) {
        let now = Utc::now();
        let key = |delta: &Delta| delta.fetch_time.unwrap_or(now);
        match direction {
            SortDirection::LatestFirst => self.entries.sort_by(|a, b| key(b).cmp(&key(a))),
            SortDirection::LatestLast => self.entries.sort_by_key(key),
        }
    }

    /// Drops entries fetched strictly before `threshold`.
    ///
    /// Entries without a fetch time are kept. Returns how many were dropped.
    pub fn prune_older_than(&mut self, threshold: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|delta| delta.fetch_time.map_or(true, |at| at >= threshold));
        before - self.entries.len()
    }

    /// Most recent entry, by position
    pub fn first(&self) -> Option<&Delta> {
        self.entries.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Delta> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
