//! Router configuration for the HTTP API.

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    archive_all, create_archive, delete_file, download_file, filter_files, get_file, list_files,
    search_files, storage_status, upload_files, AppState,
};

/// Create the main API router.
pub fn create_router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    // Uploads are bounded by the per-file ceiling, not the body limit.
    let file_routes = Router::new()
        .route(
            "/",
            get(list_files)
                .post(upload_files)
                .layer(DefaultBodyLimit::disable()),
        )
        .route("/search", get(search_files))
        .route("/filter/:kind", get(filter_files))
        .route("/:id", get(get_file).delete(delete_file))
        .route("/:id/download", get(download_file));

    let archive_routes = Router::new()
        .route("/", post(create_archive))
        .route("/all", get(archive_all));

    let api_routes = Router::new()
        .nest("/files", file_routes)
        .nest("/archive", archive_routes)
        .route("/storage", get(storage_status));

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
        .with_state(app_state)
}

/// Create a CORS layer from the configured origins.
///
/// No valid origins means any origin is allowed.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS]);

    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if parsed.is_empty() {
        layer.allow_headers(Any).allow_origin(Any)
    } else {
        layer
            .allow_headers([CONTENT_TYPE, ACCEPT])
            .allow_origin(parsed)
    }
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_health_router() {
        let _router = create_health_router();
    }

    #[test]
    fn test_create_cors_layer() {
        let _any = create_cors_layer(&[]);
        let _invalid = create_cors_layer(&["\n".to_string()]);
        let _specific = create_cors_layer(&["http://localhost:5173".to_string()]);
    }
}
