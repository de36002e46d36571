//! `cves delta`: classify what changed in git history

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use super::output::Output;
use crate::domain::time::{midnight_utc, parse_iso_with, to_iso};
use crate::domain::{Delta, IdOnly};
use crate::storage::{delta_from_history, write_delta_file, write_release_notes, Corpus, GitGateway};

#[derive(Args)]
pub struct DeltaArgs {
    /// Window start, ISO timestamp (defaults to today's UTC midnight)
    #[arg(long, value_parser = parse_timestamp)]
    pub after: Option<DateTime<Utc>>,

    /// Window end, ISO timestamp (defaults to now)
    #[arg(long, value_parser = parse_timestamp)]
    pub before: Option<DateTime<Utc>>,

    /// Also include uncommitted changes in the repository
    #[arg(long)]
    pub uncommitted: bool,

    /// Copy new and updated record files into this directory
    #[arg(long)]
    pub copy_to: Option<PathBuf>,

    /// Where to write the delta file
    /// (defaults to `<date>_delta_CVEs_at_<HH>00Z.json` in the current directory)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

/// Parses an ISO timestamp; a missing zone is read as UTC
pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    parse_iso_with(s, true).map_err(|e| e.to_string())
}

/// Default delta file name for a run at `now`
pub fn default_delta_file_name(now: DateTime<Utc>) -> String {
    format!("{}_delta_CVEs_at_{}00Z.json", now.format("%Y-%m-%d"), now.format("%H"))
}

pub fn run(corpus: &Corpus, args: DeltaArgs, output: &Output) -> Result<()> {
    let now = Utc::now();
    let after = args.after.unwrap_or_else(|| midnight_utc(now));
    let before = args.before.unwrap_or(now);
    if before < after {
        bail!("--before ({}) is earlier than --after ({})", to_iso(&before), to_iso(&after));
    }

    let base = corpus.require_base_dir()?;
    let git = corpus.git();
    let records = corpus.records();
    output.verbose_ctx("delta", &format!("window [{}, {})", to_iso(&after), to_iso(&before)));

    let history = delta_from_history(&git, after, before, &base, corpus.registry(), &IdOnly)
        .context("Failed to read git history")?;

    let mut delta = if args.uncommitted {
        let status = git.status().context("Failed to read git status")?;
        Delta::from_status(&history, &status, "", &base, corpus.registry(), &IdOnly)
    } else {
        history
    };

    let refreshed = records.hydrate(&mut delta);
    output.verbose_ctx("delta", &format!("hydrated {} summaries from disk", refreshed));

    let delta_path = args
        .output
        .unwrap_or_else(|| PathBuf::from(default_delta_file_name(now)));
    write_delta_file(&mut delta, &delta_path, corpus.links())?;
    write_release_notes(&delta, &corpus.release_notes_path())?;

    let copied = match &args.copy_to {
        Some(dir) => records.copy_records(&delta, dir)?.len(),
        None => 0,
    };

    if output.is_json() {
        output.data(&serde_json::json!({
            "after": to_iso(&after),
            "before": to_iso(&before),
            "file": delta_path.display().to_string(),
            "copied": copied,
            "delta": delta.to_document(corpus.links()),
        }));
    } else {
        output.text(&delta.summarize());
        output.success(&format!("Wrote {}", delta_path.display()));
        if let Some(dir) = &args.copy_to {
            output.success(&format!("Copied {} records to {}", copied, dir.display()));
        }
    }
    Ok(())
}
