//! Error types for notesync.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using notesync's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for notesync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Registry row or entity absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is authenticated but lacks the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// No valid caller identity was supplied
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Malformed input (empty name, bad id, quota exceeded)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Well-formed request that is not allowed in the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Caller-facing error taxonomy.
///
/// Storage, I/O, serialization and configuration failures all collapse into
/// [`ErrorKind::InternalError`]; the other kinds map one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Unauthenticated,
    ValidationError,
    InvalidOperation,
    InternalError,
}

impl ErrorKind {
    /// Stable string form used in response bodies and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::Unauthenticated => "Unauthenticated",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::InvalidOperation => "InvalidOperation",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error into the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Error::Validation(_) => ErrorKind::ValidationError,
            Error::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Error::Database(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Returns true for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
