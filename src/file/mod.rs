//! File management module for filehost.
//!
//! This module is the core of the service:
//! - Collision-free stored names (`naming`)
//! - Quota accounting and admission (`quota`)
//! - File metadata records (`metadata`)
//! - Physical file storage (`storage`)
//! - Upload ingestion, deletion and download (`service`)
//! - Bulk ZIP archives (`archive`)

mod archive;
mod metadata;
pub mod naming;
mod quota;
mod service;
mod storage;

pub use archive::{ArchiveBuilder, ArchiveBundle, ArchiveSelection, ALL_FILES_BUNDLE_NAME};
pub use metadata::{FileRepository, NewStoredFile, StoredFile};
pub use quota::{Admission, AdmissionMode, QuotaAccountant, QuotaPolicy, QuotaSnapshot};
pub use service::{
    BatchFailure, BatchReport, DeleteOutcome, Download, FileFilter, FileService, FileSort,
    PhysicalRemoval, UploadRequest,
};
pub use storage::FileStorage;

/// Bytes in one (binary) gigabyte.
pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Absolute per-file size ceiling (20 GiB), independent of the quota.
pub const MAX_FILE_SIZE: u64 = 20 * BYTES_PER_GB;

/// Usage ratio at which storage is reported as nearly full.
pub const WARNING_THRESHOLD: f64 = 0.80;

/// Usage ratio at which storage is reported as full.
pub const FULL_THRESHOLD: f64 = 0.95;

/// Content types accepted by prefix.
const ALLOWED_TYPE_PREFIXES: &[&str] = &["image/", "video/", "audio/", "text/"];

/// Content types accepted only as exact values.
const ALLOWED_EXACT_TYPES: &[&str] = &[
    "application/pdf",
    "application/zip",
    "application/x-zip-compressed",
];

/// Check a declared content type against the upload allow-list.
///
/// Parameters such as `; charset=utf-8` are ignored and the comparison is
/// case-insensitive. A missing content type is never allowed.
pub fn is_allowed_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    ALLOWED_TYPE_PREFIXES
        .iter()
        .any(|prefix| essence.len() > prefix.len() && essence.starts_with(prefix))
        || ALLOWED_EXACT_TYPES.contains(&essence.as_str())
}

/// Format a byte count for display (`1.5 MB`).
///
/// Negative values are formatted with a leading minus sign.
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes.unsigned_abs() as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let sign = if bytes < 0 { "-" } else { "" };
    format!("{sign}{size:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_file_size_constant() {
        assert_eq!(MAX_FILE_SIZE, 21_474_836_480);
    }

    #[test]
    fn test_allowed_prefixes() {
        assert!(is_allowed_content_type(Some("image/png")));
        assert!(is_allowed_content_type(Some("video/mp4")));
        assert!(is_allowed_content_type(Some("audio/mpeg")));
        assert!(is_allowed_content_type(Some("text/plain")));
    }

    #[test]
    fn test_allowed_exact_values() {
        assert!(is_allowed_content_type(Some("application/pdf")));
        assert!(is_allowed_content_type(Some("application/zip")));
        assert!(is_allowed_content_type(Some("application/x-zip-compressed")));
    }

    #[test]
    fn test_rejected_types() {
        assert!(!is_allowed_content_type(Some("application/octet-stream")));
        assert!(!is_allowed_content_type(Some("application/pdfx")));
        assert!(!is_allowed_content_type(Some("application/x-rar-compressed")));
        assert!(!is_allowed_content_type(Some("image/")));
        assert!(!is_allowed_content_type(Some("")));
        assert!(!is_allowed_content_type(None));
    }

    #[test]
    fn test_content_type_parameters_and_case() {
        assert!(is_allowed_content_type(Some("text/plain; charset=utf-8")));
        assert!(is_allowed_content_type(Some("Application/PDF")));
        assert!(is_allowed_content_type(Some(" IMAGE/JPEG ")));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.0 B");
        assert_eq!(format_bytes(512), "512.0 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(10 * BYTES_PER_GB as i64), "10.0 GB");
        assert_eq!(format_bytes(3 * 1024 * BYTES_PER_GB as i64), "3.0 TB");
        assert_eq!(format_bytes(-2048), "-2.0 KB");
    }
}
