//! filehost - quota-enforced file hosting
//!
//! Uploads are named, checked against a storage quota, written to disk and
//! recorded in SQLite. Files can be downloaded, deleted, searched and
//! bundled into ZIP archives over a small HTTP API.

pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod web;

pub use config::Config;
pub use db::{Database, DbPool};
pub use error::{FilehostError, Result};
pub use file::{
    AdmissionMode, ArchiveBuilder, ArchiveBundle, ArchiveSelection, DeleteOutcome, FileService,
    FileStorage, QuotaAccountant, QuotaPolicy, QuotaSnapshot, StoredFile, UploadRequest,
};
pub use web::WebServer;
