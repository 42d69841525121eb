//! Status snapshot: store counts plus the last computation's state.

use serde::Serialize;

use crate::catalog::query::CatalogCounts;
use crate::error::StatusCode;

/// State of the most recent computation, as seen by this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ComputationState {
    /// Nothing computed yet.
    Never,
    /// A computation is running.
    Running {
        /// Start time, RFC 3339.
        started_at: String,
        /// Requested result count.
        top_n: usize,
    },
    /// Last computation stored its results.
    Succeeded {
        /// Result write time, RFC 3339.
        at: String,
        /// Results written.
        results: usize,
    },
    /// Last computation failed; stored results are unchanged.
    Failed {
        /// Failure time, RFC 3339.
        at: String,
        /// Error status.
        status: StatusCode,
        /// Error message.
        message: String,
    },
    /// Last computation was cancelled before writing; stored results are unchanged.
    Cancelled {
        /// Cancellation time, RFC 3339.
        at: String,
    },
}

/// Everything `get_status` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Catalog row counts and last update time.
    pub catalog: CatalogCounts,
    /// Working-set entries.
    pub working_set: i64,
    /// Stored result rows.
    pub results: i64,
    /// Last computation.
    pub computation: ComputationState,
}

impl Status {
    /// Most recent catalog write, if any stock exists.
    pub fn last_updated_at(&self) -> Option<&str> {
        self.catalog.last_updated_at.as_deref()
    }
}
