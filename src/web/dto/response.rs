//! Response DTOs for Web API.

use serde::Serialize;

use crate::datetime::to_rfc3339;
use crate::file::{BatchReport, PhysicalRemoval, QuotaSnapshot, StoredFile};
use crate::web::error::{ApiError, ErrorCode};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// A stored file.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: i64,
    pub original_name: String,
    pub stored_name: String,
    pub size: i64,
    pub formatted_size: String,
    pub content_type: Option<String>,
    pub uploaded_at: String,
    pub download_count: i64,
    pub last_accessed: Option<String>,
}

impl From<StoredFile> for FileResponse {
    fn from(file: StoredFile) -> Self {
        Self {
            id: file.id,
            formatted_size: crate::file::format_bytes(file.file_size),
            original_name: file.original_name,
            stored_name: file.stored_name,
            size: file.file_size,
            content_type: file.content_type,
            uploaded_at: to_rfc3339(&file.upload_time),
            download_count: file.download_count,
            last_accessed: file.last_accessed.as_deref().map(to_rfc3339),
        }
    }
}

/// One rejected upload.
#[derive(Debug, Serialize)]
pub struct UploadFailureResponse {
    pub original_name: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Result of a multipart upload.
#[derive(Debug, Serialize)]
pub struct BatchUploadResponse {
    pub uploaded: Vec<FileResponse>,
    pub failed: Vec<UploadFailureResponse>,
    /// The remaining files were not processed because storage is full.
    pub halted: bool,
}

impl From<BatchReport> for BatchUploadResponse {
    fn from(report: BatchReport) -> Self {
        Self {
            uploaded: report.stored.into_iter().map(FileResponse::from).collect(),
            failed: report
                .failures
                .into_iter()
                .map(|failure| {
                    let error = ApiError::from(&failure.error);
                    UploadFailureResponse {
                        original_name: failure.original_name,
                        code: error.code(),
                        message: error.message().to_string(),
                    }
                })
                .collect(),
            halted: report.halted,
        }
    }
}

/// Result of a delete.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    /// Set when the physical file could not be removed cleanly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl DeleteResponse {
    pub fn from_removal(physical: &PhysicalRemoval) -> Self {
        let warning = match physical {
            PhysicalRemoval::Removed => None,
            PhysicalRemoval::AlreadyMissing => Some("physical file was already missing".to_string()),
            PhysicalRemoval::Failed(reason) => {
                Some(format!("physical file could not be removed: {reason}"))
            }
        };

        Self {
            deleted: true,
            warning,
        }
    }
}

/// Storage usage.
#[derive(Debug, Serialize)]
pub struct StorageResponse {
    pub total_space: u64,
    pub used_space: u64,
    pub available_space: i64,
    pub usage_percentage: f64,
    pub file_count: u64,
    pub formatted_total: String,
    pub formatted_used: String,
    pub formatted_available: String,
    pub warning: bool,
    pub full: bool,
}

impl From<QuotaSnapshot> for StorageResponse {
    fn from(snapshot: QuotaSnapshot) -> Self {
        Self {
            usage_percentage: snapshot.usage_percentage(),
            formatted_total: snapshot.formatted_total(),
            formatted_used: snapshot.formatted_used(),
            formatted_available: snapshot.formatted_available(),
            warning: snapshot.is_warning(),
            full: snapshot.is_full(),
            total_space: snapshot.total_space,
            used_space: snapshot.used_space,
            available_space: snapshot.available_space,
            file_count: snapshot.file_count,
        }
    }
}
