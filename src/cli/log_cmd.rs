//! `cves log`: show the delta log

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, ValueEnum};

use super::output::Output;
use crate::domain::time::{days_ago, to_iso};
use crate::domain::SortDirection;
use crate::storage::Corpus;

/// Display order for log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortArg {
    #[default]
    LatestFirst,
    LatestLast,
}

impl From<SortArg> for SortDirection {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::LatestFirst => SortDirection::LatestFirst,
            SortArg::LatestLast => SortDirection::LatestLast,
        }
    }
}

#[derive(Args)]
pub struct LogArgs {
    /// Hide entries older than this many days
    /// (defaults to delta_log.retention_days)
    #[arg(long)]
    pub prune_days: Option<i64>,

    /// Entry order
    #[arg(long, value_enum, default_value = "latest-first")]
    pub sort: SortArg,
}

pub fn run(corpus: &Corpus, args: LogArgs, output: &Output) -> Result<()> {
    let store = corpus.delta_log();
    let threshold = args
        .prune_days
        .map(|days| days_ago(Utc::now(), days))
        .transpose()
        .context("Invalid --prune-days")?;

    let mut log = store.load(threshold)?;
    log.sort_by_fetch_time(args.sort.into());

    if output.is_json() {
        let documents: Vec<_> = log.iter().map(|d| d.to_document(corpus.links())).collect();
        output.data(&documents);
        return Ok(());
    }

    if log.is_empty() {
        output.success(&format!("No entries in {}", store.path().display()));
        return Ok(());
    }

    for (i, delta) in log.iter().enumerate() {
        if i > 0 {
            output.blank();
        }
        let fetched = delta
            .fetch_time
            .as_ref()
            .map(to_iso)
            .unwrap_or_else(|| "(no fetch time)".to_string());
        output.row(&["Fetched:", &fetched]);
        output.text(&delta.summarize());
    }
    Ok(())
}
