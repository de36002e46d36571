//! # Storage Layer
//!
//! File and process I/O for the change tracker.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Records | Pretty JSON, 4-space indent | `{base}/{year}/{bucket}xxx/{id}.json` |
//! | Delta log | JSON array, newest first | `{base}/deltaLog.json` |
//! | Activity log | JSON array, newest first | `{base}/recent_activities.json` |
//! | Release notes | Text summary of the latest delta | `{base}/release_notes.md` |
//! | Config | TOML | `./cves.toml`, `<config_dir>/cves/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - Log writes are atomic (locked temp file + rename, `fs2`)
//! - Log reads take a shared lock
//! - The git working copy must not be driven by two processes at once;
//!   this is assumed, not enforced
//!
//! ## Corpus Structure
//!
//! ```text
//! cves/
//! ├── 1999/
//! │   └── 0xxx/
//! │       └── CVE-1999-0001.json
//! ├── 2023/
//! │   └── 1xxx/
//! │       └── CVE-2023-1275.json
//! ├── deltaLog.json
//! ├── recent_activities.json
//! └── release_notes.md
//! ```
//!
//! ## Key Types
//!
//! - [`Corpus`] - Entry point for a record tree and its logs
//! - [`RecordStore`] - Read/write full record files
//! - [`DeltaLogStore`] - Load (with retention) and persist the delta log
//! - [`ActivityLogStore`] - Load and persist the activity log
//! - [`GitGateway`] / [`GitCli`] - Version-control queries
//! - [`Config`] - Layered configuration

mod activity_store;
mod atomic;
mod config;
mod corpus;
mod delta_store;
mod git;
mod records;

pub use activity_store::ActivityLogStore;
pub use config::{
    ActivityLogConfig, Config, ConfigError, DeltaLogConfig, OracleConfig, RepositoryConfig,
    UpdateConfig, PROJECT_CONFIG_FILE,
};
pub use corpus::{Corpus, CorpusError, RELEASE_NOTES_FILE};
pub use delta_store::{write_delta_file, write_release_notes, DeltaLogStore, NO_CHANGES_TEXT};
pub use git::{delta_from_history, parse_short_status, GatewayError, GitCli, GitGateway};
pub use records::RecordStore;
