//! File API handlers.

use std::sync::Arc;

use std::io::SeekFrom;

use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Path, Query, State},
    response::Response,
    Json,
};
use futures::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::file::naming::display_name;
use crate::file::{
    BatchReport, DeleteOutcome, FileFilter, FileSort, UploadRequest, MAX_FILE_SIZE,
};
use crate::FilehostError;
use crate::web::dto::{
    ApiResponse, BatchUploadResponse, DeleteResponse, FileResponse, ListQuery, SearchQuery,
};
use crate::web::error::ApiError;

use super::{attachment_response, AppState};

/// Multipart field name carrying uploads.
const UPLOAD_FIELD: &str = "files";

/// Fallback content type for downloads without one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn to_responses(files: Vec<crate::file::StoredFile>) -> Json<ApiResponse<Vec<FileResponse>>> {
    Json(ApiResponse::new(
        files.into_iter().map(FileResponse::from).collect(),
    ))
}

/// GET /api/files - List files.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let sort = match query.sort.as_deref() {
        None => FileSort::default(),
        Some(s) => FileSort::parse(s)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown sort order: {s}")))?,
    };

    let files = state.file_service().list(sort).await?;
    Ok(to_responses(files))
}

/// GET /api/files/search?q= - Search files by original name.
pub async fn search_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let files = state.file_service().search(&query.q).await?;
    Ok(to_responses(files))
}

/// GET /api/files/filter/:kind - List images, videos or everything.
///
/// Unknown kinds list everything.
pub async fn filter_files(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let filter = FileFilter::parse(&kind).unwrap_or(FileFilter::All);
    let files = state.file_service().filter(filter).await?;
    Ok(to_responses(files))
}

/// POST /api/files - Upload one or more files.
///
/// Every `files` part is one upload. Empty parts are skipped, per-file
/// failures are reported in the body, and a quota failure stops the batch.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<BatchUploadResponse>>, ApiError> {
    let service = state.file_service();
    let mut report = BatchReport::default();
    let mut received = 0usize;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    })? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        received += 1;

        let original_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let (mut spool, size) =
            match spool_part(field, state.storage.base_path(), MAX_FILE_SIZE).await? {
                SpooledPart::Ready { file, size } => (file, size),
                SpooledPart::TooLarge { size } => {
                    tracing::debug!(original_name = ?original_name, size, "Upload part too large");
                    report.record(
                        display_name(original_name.as_deref()),
                        Err(FilehostError::FileTooLarge {
                            size,
                            limit: MAX_FILE_SIZE,
                        }),
                    );
                    continue;
                }
            };

        if size == 0 {
            tracing::debug!(original_name = ?original_name, "Skipping empty upload part");
            continue;
        }

        let request = UploadRequest {
            original_name,
            declared_size: size,
            content_type,
        };
        let result = service.ingest(&request, &mut spool).await;

        if !report.record(display_name(request.original_name.as_deref()), result) {
            tracing::warn!(
                stored = report.stored.len(),
                "Storage limit reached, remaining uploads ignored"
            );
            break;
        }
    }

    if received == 0 {
        return Err(ApiError::bad_request("Please select at least one file to upload"));
    }

    tracing::info!(
        uploaded = report.stored.len(),
        failed = report.failures.len(),
        halted = report.halted,
        "Upload batch processed"
    );

    Ok(Json(ApiResponse::new(BatchUploadResponse::from(report))))
}

/// An upload part copied to an anonymous temporary file.
enum SpooledPart {
    /// The whole part, rewound to its start.
    Ready { file: File, size: u64 },
    /// The part passed the limit after `size` bytes; reading stopped there.
    TooLarge { size: u64 },
}

/// Copy a multipart part into an unnamed temporary file under `dir`.
///
/// At most `limit` bytes are kept. The file disappears when dropped.
async fn spool_part<S, E>(
    stream: S,
    dir: &std::path::Path,
    limit: u64,
) -> Result<SpooledPart, ApiError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let spool_failed = |e: std::io::Error| {
        tracing::error!("Failed to spool upload: {}", e);
        ApiError::internal("Failed to buffer upload")
    };

    let spool = tempfile::tempfile_in(dir).map_err(spool_failed)?;
    let mut file = File::from_std(spool);
    let mut size = 0u64;

    futures::pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::error!("Failed to read file content: {}", e);
            ApiError::bad_request("Failed to read file")
        })?;

        size += chunk.len() as u64;
        if size > limit {
            return Ok(SpooledPart::TooLarge { size });
        }
        file.write_all(&chunk).await.map_err(spool_failed)?;
    }

    file.flush().await.map_err(spool_failed)?;
    file.seek(SeekFrom::Start(0)).await.map_err(spool_failed)?;

    Ok(SpooledPart::Ready { file, size })
}

/// GET /api/files/:id - Get file metadata.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FileResponse>>, ApiError> {
    let file = state.file_service().get(id).await?;
    Ok(Json(ApiResponse::new(FileResponse::from(file))))
}

/// GET /api/files/:id/download - Download a file.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let download = state
        .file_service()
        .open_download(id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    let file = download.file;
    let body = Body::from_stream(ReaderStream::new(download.handle));
    let content_type = file.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);

    attachment_response(
        body,
        content_type,
        &file.original_name,
        u64::try_from(file.file_size).ok(),
    )
}

/// DELETE /api/files/:id - Delete a file.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeleteResponse>>, ApiError> {
    match state.file_service().delete(id).await? {
        DeleteOutcome::NotFound => Err(ApiError::not_found("File not found")),
        DeleteOutcome::Deleted { physical } => Ok(Json(ApiResponse::new(
            DeleteResponse::from_removal(&physical),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::error::ErrorCode;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        let parts: Vec<_> = parts
            .iter()
            .map(|&p| Ok::<_, std::io::Error>(Bytes::from_static(p)))
            .collect();
        futures::stream::iter(parts)
    }

    #[tokio::test]
    async fn test_spool_part_keeps_content() {
        let dir = TempDir::new().unwrap();

        let spooled = spool_part(chunks(&[b"hello ", b"world"]), dir.path(), 64)
            .await
            .unwrap();

        let SpooledPart::Ready { mut file, size } = spooled else {
            panic!("expected a spooled part");
        };
        assert_eq!(size, 11);
        let mut content = Vec::new();
        file.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"hello world");

        // The spool file is unnamed.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_spool_part_at_limit() {
        let dir = TempDir::new().unwrap();

        let spooled = spool_part(chunks(&[b"12345", b"678"]), dir.path(), 8)
            .await
            .unwrap();

        assert!(matches!(spooled, SpooledPart::Ready { size: 8, .. }));
    }

    #[tokio::test]
    async fn test_spool_part_stops_past_limit() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = futures::channel::mpsc::unbounded::<Result<Bytes, std::io::Error>>();
        tx.unbounded_send(Ok(Bytes::from_static(b"12345"))).unwrap();
        tx.unbounded_send(Ok(Bytes::from_static(b"6789"))).unwrap();

        // The sender stays open, so only an early stop can return.
        let spooled = spool_part(rx, dir.path(), 8).await.unwrap();

        assert!(matches!(spooled, SpooledPart::TooLarge { size: 9 }));
        drop(tx);
    }

    #[tokio::test]
    async fn test_spool_part_empty() {
        let dir = TempDir::new().unwrap();

        let spooled = spool_part(chunks(&[]), dir.path(), 8).await.unwrap();

        assert!(matches!(spooled, SpooledPart::Ready { size: 0, .. }));
    }

    #[tokio::test]
    async fn test_spool_part_stream_error_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let parts: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::other("reset")),
        ];

        let result = spool_part(futures::stream::iter(parts), dir.path(), 64).await;

        let Err(err) = result else {
            panic!("expected an error");
        };
        assert_eq!(err.code(), ErrorCode::BadRequest);
    }
}
