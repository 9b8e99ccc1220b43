//! Storage status handler.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::web::dto::{ApiResponse, StorageResponse};
use crate::web::error::ApiError;

use super::AppState;

/// GET /api/storage - Current storage usage.
pub async fn storage_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<StorageResponse>>, ApiError> {
    let snapshot = state.file_service().storage_status().await?;
    Ok(Json(ApiResponse::new(StorageResponse::from(snapshot))))
}
