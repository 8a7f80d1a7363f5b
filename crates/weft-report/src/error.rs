#![forbid(unsafe_code)]

use std::fmt;
use std::io;

/// Errors of the report queue.
#[derive(Debug)]
pub enum ReportError {
    /// File system failure.
    Io(io::Error),
    /// Job descriptor or result could not be encoded or decoded.
    Serialization(String),
    /// The id cannot be used as a file name stem.
    InvalidId(String),
    /// A job with this id is already queued or running.
    Duplicate(String),
    /// No backend is registered for the job's report type.
    NoBackend(String),
    /// The backend failed to produce the report.
    Backend(String),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "I/O error: {e}"),
            ReportError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            ReportError::InvalidId(id) => write!(f, "invalid report id: {id:?}"),
            ReportError::Duplicate(id) => write!(f, "report {id} is already queued"),
            ReportError::NoBackend(kind) => write!(f, "no backend for {kind} reports"),
            ReportError::Backend(msg) => write!(f, "backend failed: {msg}"),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ReportError {
    fn from(e: io::Error) -> Self {
        ReportError::Io(e)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        ReportError::Serialization(e.to_string())
    }
}

/// Result type of queue operations.
pub type ReportResult<T> = Result<T, ReportError>;
