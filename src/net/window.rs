//! Adaptive window fetcher
//!
//! The record service limits how many records one fetch may return. To
//! fetch everything modified in `[start, end)` the window is cut into
//! frames:
//!
//! 1. Count the records in `[start, end)`.
//! 2. While the count is above the cap, halve the window by moving `end`
//!    back toward `start` (at most [`MAX_NARROWING_TRIES`] counts).
//! 3. Fetch the narrowed frame, then continue from its end.
//!
//! Halving works on whole seconds, so a burst of more than `cap` changes
//! inside one second cannot be split. The frame is still returned, over
//! the cap, with a [`WindowNonConvergent`] warning attached.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::oracle::{OracleError, OracleRecord, RecordOracle};
use crate::domain::time::to_iso;
use crate::domain::{ActivityStep, Delta, DeltaQueue, RecordSummary, StepSummary, STEP_BY_MODIFICATION_WINDOW};

/// Count budget for narrowing one frame
pub const MAX_NARROWING_TRIES: u32 = 20;

/// A frame that could not be narrowed below the cap
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "window [{}, {}) still holds {count} records (cap {cap}) after {tries} narrowing tries",
    to_iso(.start),
    to_iso(.end)
)]
pub struct WindowNonConvergent {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: u64,
    pub cap: u64,
    pub tries: u32,
}

/// One narrowed window and the records fetched for it
#[derive(Debug, Clone)]
pub struct Frame {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub records: Vec<OracleRecord>,
    /// Count queries issued while narrowing
    pub count_queries: u32,
    pub warning: Option<WindowNonConvergent>,
    started_at: DateTime<Utc>,
}

impl Frame {
    /// Describes this frame as an activity step
    pub fn step(&self) -> ActivityStep {
        ActivityStep::finished(
            STEP_BY_MODIFICATION_WINDOW,
            self.started_at,
            StepSummary {
                start_window: Some(self.start),
                end_window: Some(self.end),
                count: self.records.len(),
                record_ids: self.records.iter().map(|r| r.summary.id.clone()).collect(),
            },
        )
    }
}

/// Fetches the first frame of `[start, end)` holding at most `cap` records.
///
/// Returns `None` for an empty window. The returned frame always starts
/// at `start` and never ends after `end`.
pub fn first_frame(
    oracle: &dyn RecordOracle,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    cap: u64,
) -> Result<Option<Frame>, OracleError> {
    if start == end {
        return Ok(None);
    }

    let started_at = Utc::now();
    let mut actual_end = end;
    let mut count = 0;
    let mut tries = 0;
    let mut count_queries = 0;

    while tries < MAX_NARROWING_TRIES {
        count = oracle.count_in_window(start, actual_end)?;
        count_queries += 1;
        let width_secs = (actual_end - start).num_seconds();
        debug!(
            try_no = tries,
            count,
            cap,
            width_secs,
            start = %to_iso(&start),
            end = %to_iso(&actual_end),
            "counted window"
        );

        if count <= cap || width_secs <= 0 {
            break;
        }
        actual_end = start + Duration::milliseconds(width_secs * 1000 / 2);
        tries += 1;
    }

    let warning = (count > cap).then(|| WindowNonConvergent {
        start,
        end: actual_end,
        count,
        cap,
        tries,
    });
    if let Some(w) = &warning {
        warn!(%w, "returning over-cap frame");
    }

    let records = oracle.fetch_in_window(start, actual_end)?;

    Ok(Some(Frame {
        start,
        end: actual_end,
        records,
        count_queries,
        warning,
        started_at,
    }))
}

/// Everything a window fetch produced
#[derive(Debug, Clone, Default)]
pub struct WindowReport {
    /// Fetched records, classified
    pub delta: Delta,
    /// One step per non-empty frame, oldest first
    pub steps: Vec<ActivityStep>,
    pub warnings: Vec<WindowNonConvergent>,
    pub frames: usize,
}

impl WindowReport {
    pub fn records_fetched(&self) -> usize {
        self.steps.iter().map(|s| s.summary.count).sum()
    }
}

/// Picks the queue for a record fetched in a frame starting at `frame_start`
pub fn queue_for_fetched(summary: &RecordSummary, frame_start: DateTime<Utc>) -> DeltaQueue {
    if !summary.has_id() {
        return DeltaQueue::Unknown;
    }
    match summary.date_published {
        Some(published) if published >= frame_start => DeltaQueue::New,
        _ => DeltaQueue::Updated,
    }
}

/// Fetches every record modified in `[start, end)`, frame by frame.
///
/// `on_record` sees each record once per frame it appears in (for example
/// to write it to the repository). Stops when a frame is absent or the
/// window is exhausted.
pub fn fetch_window<F>(
    oracle: &dyn RecordOracle,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    cap: u64,
    on_record: F,
) -> anyhow::Result<WindowReport>
where
    F: FnMut(&OracleRecord) -> anyhow::Result<()>,
{
    let mut report = WindowReport::default();
    fetch_window_into(oracle, start, end, cap, &mut report, on_record)?;
    Ok(report)
}

/// Like [`fetch_window`], but accumulates into `report`.
///
/// On error `report` keeps everything gathered before the failure: the
/// steps of completed frames and the records already passed to
/// `on_record`.
pub fn fetch_window_into<F>(
    oracle: &dyn RecordOracle,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    cap: u64,
    report: &mut WindowReport,
    mut on_record: F,
) -> anyhow::Result<()>
where
    F: FnMut(&OracleRecord) -> anyhow::Result<()>,
{
    let mut next_start = start;

    while next_start < end {
        let Some(frame) = first_frame(oracle, next_start, end, cap)? else {
            break;
        };
        report.frames += 1;

        for record in &frame.records {
            on_record(record)?;
            report
                .delta
                .add(record.summary.clone(), queue_for_fetched(&record.summary, frame.start));
        }

        if !frame.records.is_empty() {
            report.steps.push(frame.step());
        }
        if let Some(warning) = frame.warning.clone() {
            report.warnings.push(warning);
        }

        if frame.end <= next_start {
            warn!(start = %to_iso(&next_start), "window made no progress, stopping");
            break;
        }
        next_start = frame.end;
    }

    info!(
        frames = report.frames,
        records = report.records_fetched(),
        changes = report.delta.number_of_changes(),
        warnings = report.warnings.len(),
        "window fetch complete"
    );
    Ok(())
}
