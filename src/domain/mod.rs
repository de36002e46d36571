//! Domain models for the change tracker
//!
//! Contains the core change-tracking logic without any I/O concerns.

pub mod time;
mod id;
mod record;
mod diff;
mod delta;
mod delta_log;
mod activity;

pub use id::{extract_from_path, IdError, IdRegistry, RecordId};
pub use record::{RecordError, RecordState, RecordSummary};
pub use diff::{classify_lines, DiffAction, DiffLine, WorkingTreeStatus};
pub use delta::{Delta, DeltaDocument, DeltaItem, DeltaQueue, IdOnly, LinkTemplate, SummarySource};
pub use delta_log::{DeltaLog, SortDirection};
pub use activity::{Activity, ActivityLog, ActivityStatus, ActivityStep, StepSummary, STEP_BY_MODIFICATION_WINDOW};
pub use time::TimeError;
