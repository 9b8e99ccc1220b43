//! HTTP API for filehost.
//!
//! A thin axum layer over the file service: uploads, downloads, deletion,
//! listing, ZIP archives and storage status.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::{build_app, WebServer};
