//! Classified errors shared by the record store and the broker clients.
//!
//! Every failure is classified once, where it happens, and tagged with the
//! name of the operation that failed. Layers above only inspect the
//! [`ErrorKind`]; the relay worker uses it to decide retry versus skip.

use std::fmt;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

/// Fixed failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    DuplicateEntry,
    /// Connection or transport failure; worth retrying.
    Unavailable,
    /// The caller's cancellation signal fired while waiting.
    Cancelled,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::DuplicateEntry => "duplicate entry",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure: `{kind, op, cause}`.
#[derive(Debug, Error)]
#[error("{kind} in {op}: {message}")]
pub struct Error {
    kind: ErrorKind,
    op: &'static str,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    pub fn new(kind: ErrorKind, op: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            op,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn not_found(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, op, message)
    }

    pub fn invalid_input(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, op, message)
    }

    pub fn duplicate_entry(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DuplicateEntry, op, message)
    }

    pub fn unavailable(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, op, message)
    }

    pub fn cancelled(op: &'static str) -> Self {
        Self::new(ErrorKind::Cancelled, op, "operation cancelled")
    }

    pub fn unknown(op: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, op, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn op(&self) -> &'static str {
        self.op
    }

    /// Classify a sled failure raised by `op`.
    pub fn from_sled(op: &'static str, err: sled::Error) -> Self {
        let kind = match &err {
            sled::Error::Io(_) => ErrorKind::Unavailable,
            _ => ErrorKind::Unknown,
        };
        Self::new(kind, op, err.to_string()).with_source(err)
    }

    /// Classify a JSON (de)serialization failure raised by `op`.
    pub fn from_json(op: &'static str, err: serde_json::Error) -> Self {
        Self::unknown(op, format!("serialization failed: {err}")).with_source(err)
    }
}
