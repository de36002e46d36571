//! CLI integration tests for cves
//!
//! Each test runs the binary in a temp directory with an isolated config
//! home so the developer's own configuration never leaks in.

use std::fs;
use std::path::Path;
use std::process::Command;

use chrono::{Duration, Utc};
use cvedelta::domain::time::to_iso;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command instance for the cves binary, isolated from the environment
fn cves_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("cves"));
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env_remove("CVES_BASE_DIRECTORY")
        .env_remove("CVES_DEFAULT_DELTA_LOG_HISTORY_IN_DAYS")
        .env_remove("CVES_RECENT_ACTIVITIES_FILENAME")
        .env_remove("CVES_DEFAULT_UPDATE_LOOKBACK_IN_MINS")
        .env_remove("CVE_SERVICES_URL")
        .env_remove("RUST_LOG");
    cmd
}

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(["-c", "user.name=test", "-c", "user.email=test@example.org"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(out.status.success(), "git {:?} failed", args);
}

fn write_delta_log(base: &Path, body: &str) {
    fs::create_dir_all(base).unwrap();
    fs::write(base.join("deltaLog.json"), body).unwrap();
}

// =============================================================================
// General
// =============================================================================

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();

    cves_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("delta"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("log"));
}

#[test]
fn test_date_prints_iso_and_local() {
    let dir = TempDir::new().unwrap();

    cves_cmd(dir.path())
        .arg("date")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"ISO:\s+\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z").unwrap())
        .stdout(predicate::str::contains("Local:"));
}

#[test]
fn test_date_json_format() {
    let dir = TempDir::new().unwrap();

    let out = cves_cmd(dir.path())
        .args(["date", "--format", "json"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(json["iso"].as_str().unwrap().ends_with('Z'));
    assert!(json["local"].is_string());
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("cves.toml"), "[delta_log]\nretention_days = \"many\"\n").unwrap();

    cves_cmd(dir.path())
        .arg("log")
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));
}

// =============================================================================
// Log
// =============================================================================

#[test]
fn test_log_without_file_is_empty() {
    let dir = TempDir::new().unwrap();

    cves_cmd(dir.path())
        .args(["log", "--base-dir", "records"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No entries"));

    cves_cmd(dir.path())
        .args(["log", "--base-dir", "records", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn test_log_prunes_and_sorts() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("records");
    let now = Utc::now();
    let body = serde_json::json!([
        {
            "fetchTime": to_iso(&(now - Duration::hours(1))),
            "numberOfChanges": 1,
            "new": [{ "cveId": "CVE-2023-1275" }],
            "updated": []
        },
        {
            "fetchTime": to_iso(&(now - Duration::hours(2))),
            "numberOfChanges": 1,
            "new": [],
            "updated": [{ "cveId": "CVE-2023-1200" }]
        },
        {
            "fetchTime": "2001-01-01T00:00:00.000Z",
            "numberOfChanges": 1,
            "new": [{ "cveId": "CVE-2000-0001" }],
            "updated": []
        }
    ]);
    write_delta_log(&base, &body.to_string());

    let out = cves_cmd(dir.path())
        .args(["log", "--base-dir", "records", "--sort", "latest-last", "--format", "json"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let entries: Vec<serde_json::Value> = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["updated"][0]["identifier"], "CVE-2023-1200");
    assert_eq!(entries[1]["new"][0]["identifier"], "CVE-2023-1275");

    cves_cmd(dir.path())
        .args(["log", "--base-dir", "records"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 changes (1 new | 0 updated)"))
        .stdout(predicate::str::contains("CVE-2023-1275"))
        .stdout(predicate::str::contains("CVE-2000-0001").not());
}

#[test]
fn test_log_rejects_huge_prune_days() {
    let dir = TempDir::new().unwrap();

    cves_cmd(dir.path())
        .args(["log", "--prune-days", "200000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --prune-days"))
        .stderr(predicate::str::contains("panicked").not());
}

#[test]
fn test_huge_retention_in_env_is_a_config_error() {
    let dir = TempDir::new().unwrap();

    cves_cmd(dir.path())
        .env("CVES_DEFAULT_DELTA_LOG_HISTORY_IN_DAYS", "200000000")
        .arg("log")
        .assert()
        .failure()
        .stderr(predicate::str::contains("retention_days"))
        .stderr(predicate::str::contains("panicked").not());
}

#[test]
fn test_log_rejects_unknown_sort() {
    let dir = TempDir::new().unwrap();

    cves_cmd(dir.path())
        .args(["log", "--sort", "sideways"])
        .assert()
        .failure();
}

// =============================================================================
// Update
// =============================================================================

#[test]
fn test_update_without_url_fails() {
    let dir = TempDir::new().unwrap();

    cves_cmd(dir.path())
        .args(["update", "--base-dir", "records"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CVE_SERVICES_URL"));
}

#[test]
fn test_update_rejects_inverted_window() {
    let dir = TempDir::new().unwrap();

    cves_cmd(dir.path())
        .args([
            "update",
            "--start",
            "2023-03-29T12:00:00Z",
            "--stop",
            "2023-03-29T11:00:00Z",
            "--url",
            "http://127.0.0.1:9",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("earlier than"));
}

#[test]
fn test_update_rejects_huge_lookback() {
    let dir = TempDir::new().unwrap();

    cves_cmd(dir.path())
        .args(["update", "--minutes-ago", "9223372036854775", "--url", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid --minutes-ago"))
        .stderr(predicate::str::contains("panicked").not());
}

#[test]
fn test_update_reports_unreachable_service() {
    let dir = TempDir::new().unwrap();

    cves_cmd(dir.path())
        .args(["update", "--minutes-ago", "5", "--url", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to count changed records"));
}

// =============================================================================
// Delta
// =============================================================================

#[test]
fn test_delta_requires_base_dir() {
    let dir = TempDir::new().unwrap();

    cves_cmd(dir.path())
        .args(["delta", "--base-dir", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Repository directory does not exist"));
}

#[test]
fn test_delta_from_git_history() {
    if !git_available() {
        return;
    }

    let dir = TempDir::new().unwrap();
    let base = dir.path().join("records");
    fs::create_dir_all(base.join("2023/1xxx")).unwrap();
    git(&base, &["init", "-q"]);

    fs::write(base.join("2023/1xxx/CVE-2023-1200.json"), "{}").unwrap();
    git(&base, &["add", "."]);
    git(&base, &["commit", "-q", "-m", "first"]);

    fs::write(base.join("2023/1xxx/CVE-2023-1200.json"), "{\"v\": 2}").unwrap();
    fs::write(base.join("2023/1xxx/CVE-2023-1275.json"), "{}").unwrap();
    git(&base, &["add", "."]);
    git(&base, &["commit", "-q", "-m", "second"]);

    let now = Utc::now();
    let after = to_iso(&(now - Duration::hours(1)));
    let before = to_iso(&(now + Duration::hours(1)));

    cves_cmd(dir.path())
        .args(["delta", "--base-dir", "records", "--after", &after, "--before", &before])
        .args(["-o", "delta.json", "--copy-to", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 changes (1 new | 1 updated)"))
        .stdout(predicate::str::contains("Wrote delta.json"));

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("delta.json")).unwrap()).unwrap();
    assert_eq!(written["numberOfChanges"], 2);
    assert_eq!(written["new"][0]["identifier"], "CVE-2023-1275");
    assert_eq!(written["updated"][0]["identifier"], "CVE-2023-1200");
    assert!(written["fetchTime"].is_string());

    assert!(base.join("release_notes.md").is_file());
    assert!(dir.path().join("out/CVE-2023-1275.json").is_file());
}
