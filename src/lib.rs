//! cvedelta - change tracking for a git-backed CVE record corpus
//!
//! Records live one JSON file per identifier under a base directory that is
//! also a git working tree. The crate works out what changed (from git
//! history, the working tree, or the record service's modification-time
//! window), keeps a newest-first delta log, and writes the delta files and
//! release notes that downstream consumers read.

pub mod domain;
pub mod storage;
pub mod net;
pub mod cli;

pub use domain::{Delta, DeltaLog, DeltaQueue, IdRegistry, RecordId, RecordSummary};
