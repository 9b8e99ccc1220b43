//! API error handling for the filehost HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::FilehostError;

/// API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Bad request (400).
    BadRequest,
    /// Not found (404).
    NotFound,
    /// Payload too large (413).
    PayloadTooLarge,
    /// Unsupported media type (415).
    UnsupportedMediaType,
    /// Internal server error (500).
    InternalError,
    /// The file could not be written to storage (500).
    StorageWriteFailed,
    /// Insufficient storage (507).
    InsufficientStorage,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorCode::InternalError | ErrorCode::StorageWriteFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCode::InsufficientStorage => StatusCode::INSUFFICIENT_STORAGE,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Error details.
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create an internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<&FilehostError> for ApiError {
    fn from(err: &FilehostError) -> Self {
        let code = match err {
            FilehostError::InvalidInput(_) => ErrorCode::BadRequest,
            FilehostError::FileTooLarge { .. } => ErrorCode::PayloadTooLarge,
            FilehostError::UnsupportedType(_) => ErrorCode::UnsupportedMediaType,
            FilehostError::QuotaExceeded { .. } => ErrorCode::InsufficientStorage,
            FilehostError::NotFound(_) => ErrorCode::NotFound,
            FilehostError::StorageWriteFailed(_) => {
                tracing::error!("Storage write failed: {}", err);
                return ApiError::new(ErrorCode::StorageWriteFailed, "Failed to store file");
            }
            _ => {
                tracing::error!("Internal error: {}", err);
                return ApiError::internal("An internal error occurred");
            }
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<FilehostError> for ApiError {
    fn from(err: FilehostError) -> Self {
        ApiError::from(&err)
    }
}
