//! # Record Oracle
//!
//! Retrieval of changed records from the record service.
//!
//! ## Overview
//!
//! The service answers two questions for a modification window
//! `[start, end)`: how many records changed, and which ones. It caps how
//! many records a single fetch may return, so large windows are cut into
//! frames by the adaptive window fetcher.
//!
//! ```text
//! fetch_window(start, end, cap)
//!  │
//!  ├── count [start, end)        > cap  → halve end, count again (≤ 20)
//!  ├── count [start, end')       ≤ cap  → fetch frame [start, end')
//!  │
//!  └── repeat from end' until end
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`RecordOracle`] | Trait: count and fetch records in a window |
//! | [`HttpOracle`] | Oracle backed by the HTTP record service |
//! | [`Frame`] | One narrowed window with its records |
//! | [`WindowReport`] | Classified delta, steps and warnings of a full fetch |
//! | [`WindowNonConvergent`] | A frame that stayed above the cap |

mod http;
mod oracle;
mod protocol;
mod window;

pub use http::HttpOracle;
pub use oracle::{OracleError, OracleRecord, RecordOracle};
pub use protocol::{CountResponse, RecordsResponse, WindowQuery, RECORD_ENDPOINT};
pub use window::{
    fetch_window, fetch_window_into, first_frame, queue_for_fetched, Frame, WindowNonConvergent, WindowReport,
    MAX_NARROWING_TRIES,
};
