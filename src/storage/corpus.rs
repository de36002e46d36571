//! Corpus access
//!
//! A [`Corpus`] is a working directory holding a record tree under its
//! base directory, plus the logs written next to the records. It hands
//! out the stores and the version-control gateway for that tree.

use std::path::{Path, PathBuf};

use anyhow::Result;
use thiserror::Error;

use super::{ActivityLogStore, Config, DeltaLogStore, GitCli, RecordStore};
use crate::domain::{IdRegistry, LinkTemplate};

/// File the summary of the latest delta is written to
pub const RELEASE_NOTES_FILE: &str = "release_notes.md";

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Repository directory does not exist: {0}")]
    MissingBaseDir(PathBuf),
}

/// A record corpus rooted at a working directory
pub struct Corpus {
    root: PathBuf,
    config: Config,
    registry: IdRegistry,
}

impl Corpus {
    /// Opens the corpus at `root` with fully resolved configuration.
    ///
    /// The identifier registry is computed here, once.
    pub fn open(root: impl Into<PathBuf>, config: Config) -> Self {
        let registry = config.registry();
        Self {
            root: root.into(),
            config,
            registry,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    pub fn links(&self) -> &LinkTemplate {
        &self.config.links
    }

    /// Directory holding the record tree
    pub fn base_dir(&self) -> PathBuf {
        self.root.join(&self.config.repository.base_dir)
    }

    /// Returns the base directory, or an error if it does not exist
    pub fn require_base_dir(&self) -> Result<PathBuf> {
        let base = self.base_dir();
        if !base.is_dir() {
            return Err(CorpusError::MissingBaseDir(base).into());
        }
        Ok(base)
    }

    pub fn records(&self) -> RecordStore {
        RecordStore::new(self.base_dir(), self.registry.clone())
    }

    pub fn delta_log(&self) -> DeltaLogStore {
        DeltaLogStore::new(
            self.base_dir().join(&self.config.delta_log.file),
            self.config.delta_log.retention_days,
            self.config.links.clone(),
        )
    }

    pub fn activity_log(&self) -> ActivityLogStore {
        ActivityLogStore::new(
            self.base_dir().join(&self.config.activity_log.file),
            self.config.activity_log.log_always,
        )
    }

    /// Gateway running inside the base directory
    pub fn git(&self) -> GitCli {
        GitCli::new(self.base_dir())
    }

    pub fn release_notes_path(&self) -> PathBuf {
        self.base_dir().join(RELEASE_NOTES_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn paths_follow_config() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.delta_log.file = "log.json".to_string();
        let corpus = Corpus::open(dir.path(), config);

        assert_eq!(corpus.base_dir(), dir.path().join("cves"));
        assert_eq!(corpus.delta_log().path(), dir.path().join("cves/log.json"));
        assert_eq!(corpus.activity_log().path(), dir.path().join("cves/recent_activities.json"));
        assert_eq!(corpus.git().dir(), dir.path().join("cves"));
        assert_eq!(corpus.release_notes_path(), dir.path().join("cves/release_notes.md"));
    }

    #[test]
    fn absolute_base_dir_is_kept() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.repository.base_dir = dir.path().join("elsewhere");
        let corpus = Corpus::open("/unused", config);

        assert_eq!(corpus.base_dir(), dir.path().join("elsewhere"));
        assert!(corpus.require_base_dir().is_err());
    }

    #[test]
    fn registry_is_built_from_config() {
        let corpus = Corpus::open(".", Config::default());
        assert!(corpus.registry().is_valid("CVE-1999-0001"));
    }
}
