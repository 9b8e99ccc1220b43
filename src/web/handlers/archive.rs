//! Archive download handlers.

use std::sync::Arc;

use axum::{body::Body, extract::State, response::Response, Json};
use futures::StreamExt;
use tokio_util::io::ReaderStream;

use crate::file::{ArchiveBundle, ArchiveSelection};
use crate::web::dto::ArchiveRequest;
use crate::web::error::ApiError;

use super::{attachment_response, AppState};

const ZIP_CONTENT_TYPE: &str = "application/zip";

/// Stream a finished bundle to the client.
///
/// The bundle travels with the body stream, so its temporary directory is
/// removed once the body is dropped, whether or not the transfer finished.
async fn stream_bundle(bundle: ArchiveBundle) -> Result<Response, ApiError> {
    let file = bundle.open().await.map_err(|e| {
        tracing::error!("Failed to open archive: {}", e);
        ApiError::internal("Failed to open archive")
    })?;
    let length = bundle.size().await.ok();
    let file_name = bundle.file_name.clone();

    let stream = ReaderStream::new(file).map(move |chunk| {
        let _keep_alive = &bundle;
        chunk
    });

    attachment_response(
        Body::from_stream(stream),
        ZIP_CONTENT_TYPE,
        &file_name,
        length,
    )
}

/// POST /api/archive - Download selected files as a ZIP.
pub async fn create_archive(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ArchiveRequest>,
) -> Result<Response, ApiError> {
    if request.ids.is_empty() {
        return Err(ApiError::bad_request("No files selected"));
    }

    let bundle = state
        .archive_builder()
        .build(&ArchiveSelection::Ids(request.ids), request.name.as_deref())
        .await?;

    stream_bundle(bundle).await
}

/// GET /api/archive/all - Download every file as a ZIP.
pub async fn archive_all(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let bundle = state
        .archive_builder()
        .build(&ArchiveSelection::All, None)
        .await?;

    stream_bundle(bundle).await
}
