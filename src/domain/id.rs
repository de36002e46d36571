//! Record identifiers and their storage paths
//!
//! ID Format: `{prefix}-{year}-{sequence}` (e.g., `CVE-2023-1275`)
//!
//! - `year` is four digits and must belong to the registry's valid years
//! - `sequence` is one or more digits with a numeric value of at least 1
//!
//! Records are sharded on disk by year and by thousands of the sequence:
//! `CVE-2023-1275` lives at `2023/1xxx/CVE-2023-1275`.
//!
//! The set of valid years depends on the current date, so it is computed
//! once into an [`IdRegistry`] and passed around explicitly.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid record ID: '{0}'")]
    InvalidIdentifier(String),
}

/// Record ID in the format `{prefix}-{year}-{sequence}`
///
/// Parsing through [`FromStr`] checks structure only. Use
/// [`IdRegistry::parse`] to also check the prefix and year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId {
    prefix: String,
    year: u16,
    /// Sequence as written, leading zeros included (`0001`)
    sequence: String,
    number: u32,
}

impl RecordId {
    /// Returns the prefix portion (e.g., `CVE`)
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the year portion
    pub fn year(&self) -> u16 {
        self.year
    }

    /// Returns the numeric value of the sequence
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Returns the shard bucket, `floor(sequence / 1000)`
    pub fn bucket(&self) -> u32 {
        self.number / 1000
    }

    /// Returns the sharded directory, e.g. `2023/1xxx`
    pub fn storage_dir(&self) -> String {
        format!("{}/{}xxx", self.year, self.bucket())
    }

    /// Returns the sharded path without extension, e.g. `2023/1xxx/CVE-2023-1275`
    pub fn storage_path(&self) -> String {
        format!("{}/{}", self.storage_dir(), self)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.prefix, self.year, self.sequence)
    }
}

impl FromStr for RecordId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdError::InvalidIdentifier(s.to_string());

        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let (prefix, year, sequence) = (parts[0], parts[1], parts[2]);
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if sequence.is_empty() || !sequence.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let year: u16 = year.parse().map_err(|_| invalid())?;
        let number: u32 = sequence.parse().map_err(|_| invalid())?;
        if number < 1 {
            return Err(invalid());
        }

        Ok(Self {
            prefix: prefix.to_string(),
            year,
            sequence: sequence.to_string(),
            number,
        })
    }
}

impl TryFrom<String> for RecordId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.to_string()
    }
}

/// Returns the file name, minus extension, of the last segment of `path`.
///
/// Never fails: empty input yields an empty string, and paths that do
/// not name a record simply yield something [`IdRegistry::parse`] rejects.
pub fn extract_from_path(path: &str) -> String {
    let file_name = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("");
    match file_name.rfind('.') {
        Some(dot) => file_name[..dot].to_string(),
        None => file_name.to_string(),
    }
}

/// The fixed rules an identifier is validated against
///
/// Valid years are `{legacy_year} ∪ [start_year ..= current_year + future_years]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRegistry {
    prefix: String,
    legacy_year: u16,
    years: RangeInclusive<u16>,
}

impl IdRegistry {
    /// Year accepted for testing and validation fixtures
    pub const LEGACY_YEAR: u16 = 1970;
    /// First year of the contiguous range
    pub const START_YEAR: u16 = 1999;
    /// Years past the current one that are still accepted
    pub const FUTURE_YEARS: u16 = 2;

    /// Creates a registry ending at `current_year + future_years`
    pub fn new(
        prefix: impl Into<String>,
        start_year: u16,
        current_year: u16,
        future_years: u16,
        legacy_year: u16,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            legacy_year,
            years: start_year..=current_year.saturating_add(future_years),
        }
    }

    /// Creates a registry with default years, computed from today's UTC date
    pub fn for_today(prefix: impl Into<String>) -> Self {
        let current_year = u16::try_from(Utc::now().year()).unwrap_or(u16::MAX);
        Self::new(
            prefix,
            Self::START_YEAR,
            current_year,
            Self::FUTURE_YEARS,
            Self::LEGACY_YEAR,
        )
    }

    /// Returns the identifier prefix this registry accepts
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if `year` is a valid year
    pub fn is_valid_year(&self, year: u16) -> bool {
        year == self.legacy_year || self.years.contains(&year)
    }

    /// Returns all valid years in ascending order
    pub fn valid_years(&self) -> Vec<u16> {
        let mut years: Vec<u16> = self.years.clone().collect();
        if !self.years.contains(&self.legacy_year) {
            years.push(self.legacy_year);
            years.sort_unstable();
        }
        years
    }

    /// Parses and validates an identifier
    pub fn parse(&self, raw: &str) -> Result<RecordId, IdError> {
        let raw = raw.trim();
        let id: RecordId = raw.parse()?;
        if id.prefix() != self.prefix || !self.is_valid_year(id.year()) {
            return Err(IdError::InvalidIdentifier(raw.to_string()));
        }
        Ok(id)
    }

    /// Returns true if `raw` is a valid identifier
    pub fn is_valid(&self, raw: &str) -> bool {
        self.parse(raw).is_ok()
    }

    /// Resolves a file path to the record it names, if any
    pub fn resolve_path(&self, path: &str) -> Option<RecordId> {
        self.parse(&extract_from_path(path)).ok()
    }
}
