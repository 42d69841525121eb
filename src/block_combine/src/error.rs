//! Error taxonomy and the structured outcome returned to callers.
//!
//! Fallible operations return [`Result<T>`]. Callers that render status rather
//! than propagate errors (the CLI, a front-end) convert with
//! [`Outcome::from`], which maps every [`Error`] variant onto a stable
//! [`StatusCode`].
//!
//! Non-fatal reference mismatches are not errors: they are collected as
//! [`IntegrityWarning`]s inside operation reports and logged at `warn`.

use std::fmt;

use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};
use serde::Serialize;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by catalog, working-set, engine and export operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or unacceptable input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Not enough distinct usable blocks to form more than the minimum number of triplets.
    #[error(
        "insufficient blocks: {usable} usable block(s) give {combinations} combination(s), more than 3 required"
    )]
    InsufficientBlocks {
        /// Distinct blocks that resolved against the catalog.
        usable: usize,
        /// `C(usable, 3)`.
        combinations: u64,
    },

    /// Transactional failure; the surrounding transaction was rolled back.
    #[error("storage error: {0}")]
    Storage(DieselError),

    /// A conflicting operation is already running.
    #[error("busy: {0} is already in progress")]
    Busy(&'static str),

    /// Cooperative cancellation was requested before results were persisted.
    #[error("computation cancelled")]
    Cancelled,

    /// Filesystem failure while reading input or writing artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text could not be decoded or encoded in the configured encoding.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<DieselError> for Error {
    fn from(e: DieselError) -> Self {
        // SQLITE_BUSY outlived busy_timeout: another writer holds the database.
        if let DieselError::DatabaseError(DatabaseErrorKind::Unknown, info) = &e {
            if info.message().contains("database is locked") {
                return Error::Busy("another database writer");
            }
        }
        Error::Storage(e)
    }
}

impl From<diesel::ConnectionError> for Error {
    fn from(e: diesel::ConnectionError) -> Self {
        Error::Config(format!("cannot open database: {e}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Storage(DieselError::DeserializationError(Box::new(e)))
    }
}

impl From<shared_utils::env::EnvError> for Error {
    fn from(e: shared_utils::env::EnvError) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    /// Status code for this error in an [`Outcome`].
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::Validation,
            Error::InsufficientBlocks { .. } => StatusCode::InsufficientBlocks,
            Error::Storage(_) => StatusCode::Storage,
            Error::Busy(_) => StatusCode::Busy,
            Error::Cancelled => StatusCode::Cancelled,
            Error::Io(_) | Error::Encoding(_) => StatusCode::Io,
            Error::Config(_) => StatusCode::Config,
        }
    }
}

/// Stable status codes for rendered outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// Operation succeeded.
    Ok,
    /// See [`Error::Validation`].
    Validation,
    /// See [`Error::InsufficientBlocks`].
    InsufficientBlocks,
    /// See [`Error::Busy`].
    Busy,
    /// See [`Error::Cancelled`].
    Cancelled,
    /// See [`Error::Storage`].
    Storage,
    /// See [`Error::Io`] and [`Error::Encoding`].
    Io,
    /// See [`Error::Config`].
    Config,
}

impl StatusCode {
    /// Numeric form, HTTP-flavoured.
    pub fn as_u16(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Validation => 400,
            StatusCode::InsufficientBlocks => 401,
            StatusCode::Busy => 409,
            StatusCode::Cancelled => 499,
            StatusCode::Storage => 500,
            StatusCode::Io => 501,
            StatusCode::Config => 503,
        }
    }

    /// True for [`StatusCode::Ok`].
    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Structured result for callers that render or react to status instead of
/// propagating errors.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    /// Status of the operation.
    pub status: StatusCode,
    /// Numeric form of `status`.
    pub code: u16,
    /// Human-readable message; `"SUCCESS"` on success.
    pub message: String,
    /// Payload on success.
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    /// Successful outcome carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::Ok,
            code: StatusCode::Ok.as_u16(),
            message: "SUCCESS".to_string(),
            data: Some(data),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(r: Result<T>) -> Self {
        match r {
            Ok(data) => Outcome::ok(data),
            Err(e) => Outcome {
                status: e.status(),
                code: e.status().as_u16(),
                message: e.to_string(),
                data: None,
            },
        }
    }
}

/// Category of a non-fatal reference mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityWarningKind {
    /// A stock declared membership in a block code that is not in the catalog.
    UnknownStockBlock,
    /// A supplementary block definition names a block code that is not in the catalog.
    UnknownExtraBlock,
    /// A working-set code no longer resolves to a catalog block.
    StaleWorkingSetCode,
}

/// Non-fatal reference mismatch, reported while the operation continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityWarning {
    /// What kind of mismatch this is.
    pub kind: IntegrityWarningKind,
    /// Code of the row that carried the dangling reference.
    pub subject: String,
    /// The reference that could not be resolved.
    pub detail: String,
}

impl IntegrityWarning {
    pub(crate) fn new(
        kind: IntegrityWarningKind,
        subject: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let w = Self {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        };
        tracing::warn!(kind = ?w.kind, subject = %w.subject, detail = %w.detail, "integrity warning");
        w
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_maps_errors_to_status_codes() {
        let o: Outcome<()> = Outcome::from(Err(Error::InsufficientBlocks {
            usable: 3,
            combinations: 1,
        }));
        assert_eq!(o.status, StatusCode::InsufficientBlocks);
        assert_eq!(o.status.as_u16(), 401);
        assert!(o.data.is_none());
        assert!(o.message.contains("3 usable block(s)"));

        let o: Outcome<u8> = Outcome::from(Ok(7));
        assert!(o.status.is_ok());
        assert_eq!(o.message, "SUCCESS");
        assert_eq!(o.data, Some(7));
    }

    #[test]
    fn busy_and_cancelled_are_distinct() {
        assert_eq!(Error::Busy("catalog reload").status(), StatusCode::Busy);
        assert_eq!(Error::Cancelled.status(), StatusCode::Cancelled);
        assert_eq!(
            Error::Busy("catalog reload").to_string(),
            "busy: catalog reload is already in progress"
        );
    }
}
