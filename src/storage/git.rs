//! Version-control gateway
//!
//! The change tracker only needs three questions answered by version
//! control, captured by [`GitGateway`]. [`GitCli`] answers them by running
//! the `git` binary inside the repository base directory, so every path
//! it reports is relative to that directory.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::domain::time::to_iso;
use crate::domain::{Delta, IdRegistry, SummarySource, WorkingTreeStatus};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Failed to run git: {0}")]
    Unavailable(String),

    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// Date layout git parses without guessing
const GIT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S +0000";

/// What the change tracker asks of version control
pub trait GitGateway {
    /// Commits made in `[after, before]`, oldest first
    fn list_commit_hashes(
        &self,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Vec<String>, GatewayError>;

    /// Raw diff lines between two commits
    fn raw_diff(&self, from: &str, to: &str) -> Result<Vec<String>, GatewayError>;

    /// Uncommitted changes
    fn status(&self) -> Result<WorkingTreeStatus, GatewayError>;
}

/// Gateway backed by the `git` command line
pub struct GitCli {
    dir: PathBuf,
}

impl GitCli {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn run(&self, args: &[&str]) -> Result<String, GatewayError> {
        debug!(dir = %self.dir.display(), ?args, "running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(GatewayError::CommandFailed {
                command: subcommand(args).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl GitGateway for GitCli {
    fn list_commit_hashes(
        &self,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Vec<String>, GatewayError> {
        let after = format!("--after={}", after.format(GIT_DATE_FORMAT));
        let before = format!("--before={}", before.format(GIT_DATE_FORMAT));
        let out = self.run(&["log", &after, &before, "--pretty=format:%H", "--", "."])?;

        // git log lists newest first
        let mut hashes: Vec<String> = out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        hashes.reverse();
        Ok(hashes)
    }

    fn raw_diff(&self, from: &str, to: &str) -> Result<Vec<String>, GatewayError> {
        let range = format!("{}..{}", from, to);
        let out = self.run(&["diff", "--raw", "--relative", &range])?;
        Ok(out.lines().filter(|l| !l.trim().is_empty()).map(String::from).collect())
    }

    fn status(&self) -> Result<WorkingTreeStatus, GatewayError> {
        let out = self.run(&[
            "-c",
            "color.status=false",
            "-c",
            "status.relativePaths=true",
            "status",
            "--short",
            "--untracked-files=all",
            "--",
            ".",
        ])?;
        Ok(parse_short_status(&out))
    }
}

/// First argument that is neither an option nor a `-c` setting
fn subcommand<'a>(args: &[&'a str]) -> &'a str {
    args.iter()
        .find(|a| !a.starts_with('-') && !a.contains('='))
        .copied()
        .unwrap_or("git")
}

/// Parses `git status --short` output into untracked and modified paths
pub fn parse_short_status(out: &str) -> WorkingTreeStatus {
    let mut status = WorkingTreeStatus::default();

    for line in out.lines() {
        if line.len() < 4 {
            continue;
        }
        let (code, path) = line.split_at(2);
        let path = unquote(path.trim());

        if code == "??" {
            status.not_added.push(path);
        } else if code.contains('M') {
            status.modified.push(path);
        }
    }
    status
}

fn unquote(path: &str) -> String {
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(path)
        .to_string()
}

/// Builds a delta from the commits made between `start` and `stop`.
///
/// Diffs the oldest commit in the window against the newest. With fewer
/// than two commits there is no range to diff and the delta is empty.
pub fn delta_from_history(
    gateway: &dyn GitGateway,
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
    base_path: &Path,
    registry: &IdRegistry,
    source: &dyn SummarySource,
) -> Result<Delta, GatewayError> {
    let commits = gateway.list_commit_hashes(start, stop)?;
    let mut delta = Delta::new();

    let (Some(oldest), Some(newest)) = (commits.first(), commits.last()) else {
        debug!(start = %to_iso(&start), stop = %to_iso(&stop), "no commits in window");
        return Ok(delta);
    };

    let lines = gateway.raw_diff(oldest, newest)?;
    let applied = delta.classify_from_diff(lines.iter().map(String::as_str), base_path, registry, source);
    debug!(commits = commits.len(), lines = lines.len(), applied, "classified history");
    Ok(delta)
}
