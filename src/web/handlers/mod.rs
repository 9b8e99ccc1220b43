//! API handlers for filehost.

pub mod archive;
pub mod file;
pub mod storage;

pub use archive::*;
pub use file::*;
pub use storage::*;

use axum::http::header;
use axum::response::Response;

use crate::db::Database;
use crate::file::{ArchiveBuilder, FileService, FileStorage, QuotaPolicy};

use super::error::ApiError;

/// Application state shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Metadata store.
    pub db: Database,
    /// Physical file storage.
    pub storage: FileStorage,
    /// Quota settings.
    pub quota: QuotaPolicy,
}

impl AppState {
    /// Create a new application state.
    pub fn new(db: Database, storage: FileStorage, quota: QuotaPolicy) -> Self {
        Self { db, storage, quota }
    }

    /// File service borrowing this state.
    pub fn file_service(&self) -> FileService<'_> {
        FileService::new(&self.db, &self.storage, &self.quota)
    }

    /// Archive builder borrowing this state.
    pub fn archive_builder(&self) -> ArchiveBuilder<'_> {
        ArchiveBuilder::new(&self.db, &self.storage)
    }
}

/// Build a Content-Disposition header value for a download.
///
/// Non-ASCII names are sent with RFC 5987 `filename*` encoding alongside a
/// sanitized `filename` fallback.
pub(crate) fn content_disposition_header(filename: &str) -> String {
    let needs_encoding = !filename.is_ascii()
        || filename
            .chars()
            .any(|c| c.is_control() || c == '"' || c == '\\');

    if !needs_encoding {
        return format!("attachment; filename=\"{filename}\"");
    }

    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

/// Attach download headers to a streamed body.
pub(crate) fn attachment_response(
    body: axum::body::Body,
    content_type: &str,
    filename: &str,
    content_length: Option<u64>,
) -> Result<Response, ApiError> {
    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(filename),
        );

    if let Some(length) = content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    builder.body(body).map_err(|e| {
        tracing::error!("Failed to build response: {}", e);
        ApiError::internal("Failed to build response")
    })
}
