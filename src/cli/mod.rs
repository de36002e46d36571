//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose | Writes |
//! |---------|---------|--------|
//! | `date` | Current time as ISO (UTC) and local | nothing |
//! | `delta` | Classify git history into a delta | delta file, release notes |
//! | `update` | Fetch changed records from the record service | records, logs, release notes |
//! | `log` | Show the delta log | nothing |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output. `RUST_LOG` overrides the
//! log filter:
//! ```bash
//! RUST_LOG=cvedelta=trace cves update --minutes-ago 60
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod date_cmd;
mod delta_cmd;
mod log_cmd;
mod update_cmd;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};
