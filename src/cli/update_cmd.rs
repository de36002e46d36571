//! `cves update`: pull changed records from the record service

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use tracing::warn;

use super::delta_cmd::parse_timestamp;
use super::output::Output;
use crate::domain::time::{minutes_ago, to_iso};
use crate::domain::{Activity, ActivityStatus, Delta};
use crate::net::{fetch_window_into, HttpOracle, RecordOracle, WindowReport};
use crate::storage::{write_release_notes, ActivityLogStore, Corpus, GitGateway};

/// Activity name recorded for window updates
const ACTIVITY_NAME: &str = "cves in window";

#[derive(Args)]
pub struct UpdateArgs {
    /// Window start, ISO timestamp (overrides --minutes-ago)
    #[arg(long, value_parser = parse_timestamp)]
    pub start: Option<DateTime<Utc>>,

    /// Start the window this many minutes ago
    /// (defaults to update.lookback_minutes)
    #[arg(long)]
    pub minutes_ago: Option<i64>,

    /// Window end, ISO timestamp (defaults to now)
    #[arg(long, value_parser = parse_timestamp)]
    pub stop: Option<DateTime<Utc>>,

    /// Most records fetched per frame (defaults to update.max_per_frame)
    #[arg(long)]
    pub max: Option<u64>,

    /// Record service base URL (overrides oracle.url and CVE_SERVICES_URL)
    #[arg(long)]
    pub url: Option<String>,

    /// Log the run even if nothing changed
    #[arg(long)]
    pub log_always: bool,
}

/// Resolved update window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

/// Works out the window; an explicit start wins over `minutes_ago`
pub fn resolve_window(args: &UpdateArgs, default_minutes: i64, now: DateTime<Utc>) -> Result<Window> {
    let start = match args.start {
        Some(start) => start,
        None => minutes_ago(now, args.minutes_ago.unwrap_or(default_minutes))
            .context("Invalid --minutes-ago")?,
    };
    let stop = args.stop.unwrap_or(now);

    if stop < start {
        bail!("--stop ({}) is earlier than the window start ({})", to_iso(&stop), to_iso(&start));
    }
    Ok(Window { start, stop })
}

pub fn run(corpus: &Corpus, args: UpdateArgs, output: &Output) -> Result<()> {
    let config = corpus.config();
    let window = resolve_window(&args, config.update.lookback_minutes, Utc::now())?;
    let cap = args.max.unwrap_or(config.update.max_per_frame).max(1);
    let log_always = args.log_always || config.activity_log.log_always;

    let url = args
        .url
        .clone()
        .or_else(|| config.oracle.url.clone())
        .context("No record service URL configured (set CVE_SERVICES_URL, oracle.url or --url)")?;
    let oracle = HttpOracle::new(&url, Duration::from_secs(config.oracle.timeout_secs))?;

    output.verbose_ctx(
        "update",
        &format!("window [{}, {}), cap {}", to_iso(&window.start), to_iso(&window.stop), cap),
    );

    let total = oracle
        .count_in_window(window.start, window.stop)
        .context("Failed to count changed records")?;
    if total == 0 && !log_always {
        output.success("No new or updated records");
        return Ok(());
    }

    let base = corpus.base_dir();
    let records = corpus.records();
    let mut activity = Activity::start(ACTIVITY_NAME);

    let mut report = WindowReport::default();
    let fetched = fetch_window_into(&oracle, window.start, window.stop, cap, &mut report, |record| {
        if let Some(raw) = &record.raw {
            records.write_record(raw)?;
        }
        Ok(())
    });

    for step in &report.steps {
        activity.prepend_step(step.clone());
    }
    for warning in &report.warnings {
        output.warning(&warning.to_string());
        activity.errors.push(warning.to_string());
    }

    if let Err(e) = fetched {
        // records written before the failure stay on disk; say so in the log
        activity.errors.push(format!("{:#}", e));
        activity.finish(ActivityStatus::Failed, Some(&report.delta), corpus.links());
        if let Err(log_err) = record_activity(corpus, activity, log_always) {
            warn!(error = %format!("{:#}", log_err), "failed to record failed activity");
        }
        return Err(e.context("Failed to fetch changed records"));
    }

    // the working tree says what actually changed on disk
    let mut delta = match corpus.git().status() {
        Ok(status) => Delta::from_status(&Delta::new(), &status, "", &base, corpus.registry(), &records),
        Err(e) => {
            warn!(error = %e, "git status unavailable, using fetched records");
            report.delta.clone()
        }
    };
    delta.fetch_time = Some(Utc::now());
    activity.finish(ActivityStatus::Completed, Some(&delta), corpus.links());

    let mut delta_log_written = false;
    let mut activity_log_written = false;
    if log_always || delta.number_of_changes() > 0 {
        activity_log_written = record_activity(corpus, activity, log_always)?;

        let delta_store = corpus.delta_log();
        let mut log = delta_store.load(None)?;
        log.prepend(delta.clone());
        delta_log_written = delta_store.persist(&log)?;

        write_release_notes(&delta, &corpus.release_notes_path())?;
    }

    if output.is_json() {
        output.data(&serde_json::json!({
            "start": to_iso(&window.start),
            "stop": to_iso(&window.stop),
            "count": total,
            "frames": report.frames,
            "fetched": report.records_fetched(),
            "warnings": report.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
            "deltaLogWritten": delta_log_written,
            "activityLogWritten": activity_log_written,
            "delta": delta.to_document(corpus.links()),
        }));
    } else {
        output.text(&delta.summarize());
        output.success(&format!(
            "Fetched {} records in {} frames",
            report.records_fetched(),
            report.frames
        ));
    }
    Ok(())
}

/// Prepends `activity` to the activity log and writes it under the log policy
fn record_activity(corpus: &Corpus, activity: Activity, log_always: bool) -> Result<bool> {
    let store = ActivityLogStore::new(corpus.activity_log().path(), log_always);
    let mut activities = store.load()?;
    activities.prepend(activity);
    store.persist(&activities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::time::parse_iso;

    fn args() -> UpdateArgs {
        UpdateArgs {
            start: None,
            minutes_ago: None,
            stop: None,
            max: None,
            url: None,
            log_always: false,
        }
    }

    fn now() -> DateTime<Utc> {
        parse_iso("2023-03-29T19:00:00Z").unwrap()
    }

    #[test]
    fn window_defaults_to_lookback() {
        let window = resolve_window(&args(), 180, now()).unwrap();

        assert_eq!(to_iso(&window.start), "2023-03-29T16:00:00.000Z");
        assert_eq!(window.stop, now());
    }

    #[test]
    fn explicit_start_wins_over_minutes_ago() {
        let mut a = args();
        a.start = Some(parse_iso("2023-03-29T00:00:00Z").unwrap());
        a.minutes_ago = Some(5);

        let window = resolve_window(&a, 180, now()).unwrap();
        assert_eq!(to_iso(&window.start), "2023-03-29T00:00:00.000Z");
    }

    #[test]
    fn stop_before_start_is_rejected() {
        let mut a = args();
        a.stop = Some(parse_iso("2023-03-29T00:00:00Z").unwrap());
        a.minutes_ago = Some(5);

        assert!(resolve_window(&a, 180, now()).is_err());
    }

    #[test]
    fn huge_lookback_is_an_error() {
        let mut a = args();
        a.minutes_ago = Some(9_223_372_036_854_775);

        let err = resolve_window(&a, 180, now()).unwrap_err();
        assert!(format!("{:#}", err).contains("--minutes-ago"));
    }

    #[test]
    fn failed_run_with_steps_is_recorded() {
        use crate::domain::{ActivityStep, LinkTemplate, StepSummary, STEP_BY_MODIFICATION_WINDOW};
        use crate::storage::Config;

        let dir = tempfile::TempDir::new().unwrap();
        let corpus = Corpus::open(dir.path(), Config::default());

        let mut activity = Activity::start(ACTIVITY_NAME);
        activity.prepend_step(ActivityStep::finished(
            STEP_BY_MODIFICATION_WINDOW,
            now(),
            StepSummary {
                count: 1,
                record_ids: vec!["CVE-2023-1275".to_string()],
                ..Default::default()
            },
        ));
        activity.errors.push("disk full".to_string());
        activity.finish(ActivityStatus::Failed, None, &LinkTemplate::default());

        assert!(record_activity(&corpus, activity, false).unwrap());

        let log = corpus.activity_log().load().unwrap();
        let recorded = log.most_recent().unwrap();
        assert_eq!(recorded.status, ActivityStatus::Failed);
        assert_eq!(recorded.errors, vec!["disk full".to_string()]);
    }

    #[test]
    fn failed_run_without_steps_follows_log_policy() {
        use crate::domain::LinkTemplate;
        use crate::storage::Config;

        let dir = tempfile::TempDir::new().unwrap();
        let corpus = Corpus::open(dir.path(), Config::default());
        let failed = || {
            let mut activity = Activity::start(ACTIVITY_NAME);
            activity.finish(ActivityStatus::Failed, None, &LinkTemplate::default());
            activity
        };

        assert!(!record_activity(&corpus, failed(), false).unwrap());
        assert!(record_activity(&corpus, failed(), true).unwrap());
    }
}
