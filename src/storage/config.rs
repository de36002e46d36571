//! Configuration handling
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. Global file: `<config_dir>/cves/config.toml`
//! 3. Project file: `./cves.toml` (or the file given with `--config`)
//! 4. Environment variables
//! 5. Command-line flags (applied by the CLI)
//!
//! | Key | Default | Environment |
//! |-----|---------|-------------|
//! | `repository.base_dir` | `cves` | `CVES_BASE_DIRECTORY` |
//! | `delta_log.retention_days` | `30` | `CVES_DEFAULT_DELTA_LOG_HISTORY_IN_DAYS` |
//! | `activity_log.file` | `recent_activities.json` | `CVES_RECENT_ACTIVITIES_FILENAME` |
//! | `update.lookback_minutes` | `180` | `CVES_DEFAULT_UPDATE_LOOKBACK_IN_MINS` |
//! | `oracle.url` | unset | `CVE_SERVICES_URL` |

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{IdRegistry, LinkTemplate};

/// Name of the project-level configuration file
pub const PROJECT_CONFIG_FILE: &str = "cves.toml";

/// Longest delta log retention accepted (100 years)
pub const MAX_RETENTION_DAYS: i64 = 36_525;

/// Longest default update lookback accepted (one year)
pub const MAX_LOOKBACK_MINUTES: i64 = 366 * 24 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Where the corpus lives and which identifiers it holds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Root of the record tree, relative to the working directory
    pub base_dir: PathBuf,

    pub id_prefix: String,

    /// First year of the contiguous valid range
    pub start_year: u16,

    /// Extra year accepted outside the range
    pub legacy_year: u16,

    /// Years past the current one still accepted
    pub future_years: u16,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("cves"),
            id_prefix: "CVE".to_string(),
            start_year: IdRegistry::START_YEAR,
            legacy_year: IdRegistry::LEGACY_YEAR,
            future_years: IdRegistry::FUTURE_YEARS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeltaLogConfig {
    /// File name, relative to the repository base directory
    pub file: String,

    /// Entries older than this are pruned on load
    pub retention_days: i64,
}

impl Default for DeltaLogConfig {
    fn default() -> Self {
        Self {
            file: "deltaLog.json".to_string(),
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ActivityLogConfig {
    /// File name, relative to the repository base directory
    pub file: String,

    /// Log and write even runs that changed nothing
    pub log_always: bool,
}

impl Default for ActivityLogConfig {
    fn default() -> Self {
        Self {
            file: "recent_activities.json".to_string(),
            log_always: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpdateConfig {
    /// Default window start, in minutes before now
    pub lookback_minutes: i64,

    /// Most records fetched per frame
    pub max_per_frame: u64,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: 180,
            max_per_frame: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL of the record service
    pub url: Option<String>,

    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
        }
    }
}

/// Combined configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub repository: RepositoryConfig,
    pub delta_log: DeltaLogConfig,
    pub activity_log: ActivityLogConfig,
    pub update: UpdateConfig,
    pub oracle: OracleConfig,
    pub links: LinkTemplate,
}

impl Config {
    /// Loads configuration from every layer except command-line flags.
    ///
    /// `explicit` replaces the project file; unlike the project file it
    /// must exist.
    pub fn load(working_dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut merged = toml::Table::new();

        if let Some(global) = Self::global_config_dir().map(|dir| dir.join("config.toml")) {
            if global.exists() {
                merge_tables(&mut merged, read_table(&global)?);
            }
        }

        match explicit {
            Some(path) => merge_tables(&mut merged, read_table(path)?),
            None => {
                let project = working_dir.join(PROJECT_CONFIG_FILE);
                if project.exists() {
                    merge_tables(&mut merged, read_table(&project)?);
                }
            }
        }

        let mut config: Config = toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))
            .context("Failed to parse configuration")?;

        config
            .apply_env()
            .context("Failed to apply environment overrides")?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "cvedelta", "cves").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Applies overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`; empty values are ignored
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("CVES_BASE_DIRECTORY") {
            self.repository.base_dir = PathBuf::from(dir);
        }
        if let Some(days) = get("CVES_DEFAULT_DELTA_LOG_HISTORY_IN_DAYS") {
            self.delta_log.retention_days = parse_number("CVES_DEFAULT_DELTA_LOG_HISTORY_IN_DAYS", &days)?;
        }
        if let Some(file) = get("CVES_RECENT_ACTIVITIES_FILENAME") {
            self.activity_log.file = file;
        }
        if let Some(mins) = get("CVES_DEFAULT_UPDATE_LOOKBACK_IN_MINS") {
            self.update.lookback_minutes = parse_number("CVES_DEFAULT_UPDATE_LOOKBACK_IN_MINS", &mins)?;
        }
        if let Some(url) = get("CVE_SERVICES_URL") {
            self.oracle.url = Some(url);
        }
        Ok(())
    }

    /// Rejects settings no run could work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repository.id_prefix.is_empty() {
            return Err(ConfigError::Invalid("repository.id_prefix must not be empty".into()));
        }
        if self.update.max_per_frame == 0 {
            return Err(ConfigError::Invalid("update.max_per_frame must be at least 1".into()));
        }
        if !(0..=MAX_RETENTION_DAYS).contains(&self.delta_log.retention_days) {
            return Err(ConfigError::Invalid(format!(
                "delta_log.retention_days must be between 0 and {}, got {}",
                MAX_RETENTION_DAYS, self.delta_log.retention_days
            )));
        }
        if !(0..=MAX_LOOKBACK_MINUTES).contains(&self.update.lookback_minutes) {
            return Err(ConfigError::Invalid(format!(
                "update.lookback_minutes must be between 0 and {}, got {}",
                MAX_LOOKBACK_MINUTES, self.update.lookback_minutes
            )));
        }
        Ok(())
    }

    /// Builds the identifier registry for the current UTC year
    pub fn registry(&self) -> IdRegistry {
        let current_year = u16::try_from(Utc::now().year()).unwrap_or(u16::MAX);
        let repo = &self.repository;
        IdRegistry::new(
            repo.id_prefix.clone(),
            repo.start_year,
            current_year,
            repo.future_years,
            repo.legacy_year,
        )
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;

    toml::from_str(&content)
        .map_err(|e| ConfigError::Parse(e.to_string()))
        .with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Merges `overlay` into `base`, descending into nested tables
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(nested) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, nested);
                continue;
            }
            base.insert(key, toml::Value::Table(nested));
        } else {
            base.insert(key, value);
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} must be a number, got '{}'", key, value)))
}
