//! Error types for filehost.

use thiserror::Error;

/// Common error type for filehost.
#[derive(Error, Debug)]
pub enum FilehostError {
    /// Database error.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The upload was empty or otherwise malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The upload exceeds the absolute per-file ceiling.
    #[error("file size {size} exceeds the maximum of {limit} bytes")]
    FileTooLarge {
        /// Declared size of the upload.
        size: u64,
        /// Per-file ceiling.
        limit: u64,
    },

    /// The declared content type is not on the allow-list.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// Not enough remaining capacity for the upload.
    #[error("storage limit exceeded: {requested} bytes requested, {available} bytes available")]
    QuotaExceeded {
        /// Size that was asked for.
        requested: u64,
        /// Available space at the time of the check (may be negative).
        available: i64,
    },

    /// Writing the file to disk failed.
    #[error("failed to write file: {0}")]
    StorageWriteFailed(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Archive creation error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for FilehostError {
    fn from(e: sqlx::Error) -> Self {
        FilehostError::Database(e.to_string())
    }
}

impl From<zip::result::ZipError> for FilehostError {
    fn from(e: zip::result::ZipError) -> Self {
        FilehostError::Archive(e.to_string())
    }
}

/// Result type alias for filehost operations.
pub type Result<T> = std::result::Result<T, FilehostError>;
