//! File service for filehost.
//!
//! This module provides high-level file operations including:
//! - Upload ingestion with size, type and quota checks
//! - Batch ingestion that halts once the quota is exhausted
//! - Download with access tracking
//! - Listing, search and deletion

use chrono::{DateTime, Utc};
use tokio::fs::File;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::{FilehostError, Result};

use super::metadata::{FileRepository, NewStoredFile, StoredFile};
use super::naming::{display_name, generate_stored_name};
use super::quota::{QuotaAccountant, QuotaPolicy, QuotaSnapshot};
use super::storage::FileStorage;
use super::{is_allowed_content_type, MAX_FILE_SIZE};

/// Fresh names tried before a write gives up on name collisions.
const MAX_NAME_ATTEMPTS: usize = 3;

/// Request data for a single upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Name supplied by the client.
    pub original_name: Option<String>,
    /// Size declared by the client, used for the up-front checks.
    pub declared_size: u64,
    /// Content type declared by the client.
    pub content_type: Option<String>,
}

impl UploadRequest {
    /// Create a new upload request.
    pub fn new(original_name: impl Into<String>, declared_size: u64) -> Self {
        Self {
            original_name: Some(original_name.into()),
            declared_size,
            content_type: None,
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn label(&self) -> String {
        display_name(self.original_name.as_deref())
    }
}

/// One rejected upload within a batch.
#[derive(Debug)]
pub struct BatchFailure {
    /// Display name of the rejected upload.
    pub original_name: String,
    /// Why it was rejected.
    pub error: FilehostError,
}

/// Outcome of a batch upload.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files stored successfully, in order.
    pub stored: Vec<StoredFile>,
    /// Files that were rejected, in order.
    pub failures: Vec<BatchFailure>,
    /// Processing stopped early because the quota was exhausted.
    pub halted: bool,
}

impl BatchReport {
    /// Record the result of one upload.
    ///
    /// Returns false once the batch must stop.
    pub fn record(&mut self, original_name: String, result: Result<StoredFile>) -> bool {
        match result {
            Ok(file) => self.stored.push(file),
            Err(error) => {
                if matches!(error, FilehostError::QuotaExceeded { .. }) {
                    self.halted = true;
                }
                self.failures.push(BatchFailure {
                    original_name,
                    error,
                });
            }
        }
        !self.halted
    }
}

/// What happened to the physical file during a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalRemoval {
    Removed,
    /// The file was already gone.
    AlreadyMissing,
    /// Removal failed; the record was deleted anyway.
    Failed(String),
}

/// Result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// No record with that ID.
    NotFound,
    /// The record was removed.
    Deleted { physical: PhysicalRemoval },
}

impl DeleteOutcome {
    /// Check whether a record was removed.
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted { .. })
    }
}

/// An opened download.
#[derive(Debug)]
pub struct Download {
    /// Record, including the incremented download count.
    pub file: StoredFile,
    /// Handle positioned at the start of the file.
    pub handle: File,
}

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileSort {
    /// Newest first.
    #[default]
    Recent,
    /// Most downloaded first.
    Popular,
}

impl FileSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "recent" => Some(FileSort::Recent),
            "popular" => Some(FileSort::Popular),
            _ => None,
        }
    }
}

/// Content-type filter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFilter {
    Images,
    Videos,
    All,
}

impl FileFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "images" => Some(FileFilter::Images),
            "videos" => Some(FileFilter::Videos),
            "all" => Some(FileFilter::All),
            _ => None,
        }
    }
}

/// File service for managing uploads, downloads and deletion.
pub struct FileService<'a> {
    db: &'a Database,
    storage: &'a FileStorage,
    policy: &'a QuotaPolicy,
}

impl<'a> FileService<'a> {
    /// Create a new FileService.
    pub fn new(db: &'a Database, storage: &'a FileStorage, policy: &'a QuotaPolicy) -> Self {
        Self {
            db,
            storage,
            policy,
        }
    }

    fn repo(&self) -> FileRepository<'_> {
        FileRepository::new(self.db.pool())
    }

    fn accountant(&self) -> QuotaAccountant<'_> {
        QuotaAccountant::new(self.db, self.policy)
    }

    /// Ingest one upload.
    ///
    /// Checks run in order: empty input, per-file ceiling, content type,
    /// quota. The bytes are written before the record is created, so a
    /// failed write never leaves a record behind.
    pub async fn ingest<R>(&self, request: &UploadRequest, reader: &mut R) -> Result<StoredFile>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let size = request.declared_size;

        if size == 0 {
            return Err(FilehostError::InvalidInput("file is empty".to_string()));
        }

        if size > MAX_FILE_SIZE {
            return Err(FilehostError::FileTooLarge {
                size,
                limit: MAX_FILE_SIZE,
            });
        }

        if !is_allowed_content_type(request.content_type.as_deref()) {
            debug!(content_type = ?request.content_type, "Rejected content type");
            return Err(FilehostError::UnsupportedType(
                request
                    .content_type
                    .clone()
                    .unwrap_or_else(|| "(none)".to_string()),
            ));
        }

        // Released when this function returns, after the record exists.
        let _admission = self.accountant().admit(size).await?;

        let (stored_name, written) = self.write_new_file(request, reader).await?;

        if written == 0 {
            self.remove_quietly(&stored_name).await;
            return Err(FilehostError::InvalidInput("file is empty".to_string()));
        }

        let file_size = i64::try_from(written).map_err(|_| FilehostError::FileTooLarge {
            size: written,
            limit: MAX_FILE_SIZE,
        })?;

        let new_file = NewStoredFile {
            original_name: request.label(),
            stored_name: stored_name.clone(),
            file_path: self
                .storage
                .get_file_path(&stored_name)
                .to_string_lossy()
                .into_owned(),
            file_size,
            content_type: request.content_type.clone(),
        };

        match self.repo().create(&new_file).await {
            Ok(file) => {
                info!(
                    id = file.id,
                    stored_name = %file.stored_name,
                    size = file.file_size,
                    "File stored"
                );
                Ok(file)
            }
            Err(e) => {
                self.remove_quietly(&stored_name).await;
                Err(e)
            }
        }
    }

    /// Write the stream under a freshly generated name.
    async fn write_new_file<R>(
        &self,
        request: &UploadRequest,
        reader: &mut R,
    ) -> Result<(String, u64)>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut names = std::iter::repeat_with(|| {
            generate_stored_name(request.original_name.as_deref())
        });
        self.write_with_names(&mut names, reader).await
    }

    /// Write the stream under the first name from `names` that is free.
    ///
    /// Only the exclusive create can report a collision; nothing has been
    /// read from `reader` at that point, so the next name gets the whole
    /// stream. Errors while copying are never retried.
    async fn write_with_names<N, R>(&self, names: &mut N, reader: &mut R) -> Result<(String, u64)>
    where
        N: Iterator<Item = String>,
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut attempts = 0;
        let (stored_name, file) = loop {
            attempts += 1;
            let Some(stored_name) = names.next() else {
                return Err(FilehostError::StorageWriteFailed(
                    "no stored name available".to_string(),
                ));
            };

            match self.storage.create(&stored_name).await {
                Ok(file) => break (stored_name, file),
                Err(e)
                    if e.kind() == std::io::ErrorKind::AlreadyExists
                        && attempts < MAX_NAME_ATTEMPTS =>
                {
                    warn!(stored_name = %stored_name, "Stored name collision, retrying");
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    return Err(FilehostError::StorageWriteFailed(format!(
                        "no free stored name after {attempts} attempts"
                    )));
                }
                Err(e) => {
                    warn!(stored_name = %stored_name, error = %e, "Failed to create file");
                    return Err(FilehostError::StorageWriteFailed(e.to_string()));
                }
            }
        };

        match FileStorage::fill(file, reader).await {
            Ok(written) => Ok((stored_name, written)),
            Err(e) => {
                warn!(stored_name = %stored_name, error = %e, "Failed to write file");
                self.remove_quietly(&stored_name).await;
                Err(FilehostError::StorageWriteFailed(e.to_string()))
            }
        }
    }

    async fn remove_quietly(&self, stored_name: &str) {
        if let Err(e) = self.storage.delete(stored_name).await {
            warn!(stored_name = %stored_name, error = %e, "Failed to remove file");
        }
    }

    /// Ingest several uploads in order.
    ///
    /// Per-file failures are collected; a quota failure stops the batch.
    pub async fn ingest_batch<I, R>(&self, uploads: I) -> BatchReport
    where
        I: IntoIterator<Item = (UploadRequest, R)>,
        R: AsyncRead + Unpin,
    {
        let mut report = BatchReport::default();

        for (request, mut reader) in uploads {
            let result = self.ingest(&request, &mut reader).await;
            if !report.record(request.label(), result) {
                warn!(
                    stored = report.stored.len(),
                    "Storage limit reached, stopping batch"
                );
                break;
            }
        }

        report
    }

    /// Delete a file and its record.
    ///
    /// The record is removed even if the physical file cannot be.
    pub async fn delete(&self, id: i64) -> Result<DeleteOutcome> {
        let repo = self.repo();
        let Some(file) = repo.get_by_id(id).await? else {
            return Ok(DeleteOutcome::NotFound);
        };

        let physical = match self.storage.delete(&file.stored_name).await {
            Ok(true) => PhysicalRemoval::Removed,
            Ok(false) => {
                warn!(id, stored_name = %file.stored_name, "Physical file already missing");
                PhysicalRemoval::AlreadyMissing
            }
            Err(e) => {
                warn!(id, stored_name = %file.stored_name, error = %e, "Failed to remove physical file");
                PhysicalRemoval::Failed(e.to_string())
            }
        };

        if !repo.delete(id).await? {
            debug!(id, "Record already removed by a concurrent delete");
            return Ok(DeleteOutcome::NotFound);
        }
        info!(id, stored_name = %file.stored_name, "File deleted");

        Ok(DeleteOutcome::Deleted { physical })
    }

    /// Open a file for download and record the access.
    ///
    /// Returns `None` if the record or its physical file is missing.
    pub async fn open_download(&self, id: i64) -> Result<Option<Download>> {
        let repo = self.repo();
        let Some(file) = repo.get_by_id(id).await? else {
            return Ok(None);
        };

        let handle = match self.storage.open(&file.stored_name).await {
            Ok(handle) => handle,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(id, stored_name = %file.stored_name, "Physical file missing for download");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        repo.increment_downloads(id).await?;
        let file = repo.get_by_id(id).await?.unwrap_or(file);
        debug!(id, downloads = file.download_count, "File downloaded");

        Ok(Some(Download { file, handle }))
    }

    /// Get a record by ID.
    pub async fn get(&self, id: i64) -> Result<StoredFile> {
        self.repo()
            .get_by_id(id)
            .await?
            .ok_or_else(|| FilehostError::NotFound("file".to_string()))
    }

    /// Get a record by stored name.
    pub async fn get_by_stored_name(&self, stored_name: &str) -> Result<Option<StoredFile>> {
        self.repo().get_by_stored_name(stored_name).await
    }

    /// List all files.
    pub async fn list(&self, sort: FileSort) -> Result<Vec<StoredFile>> {
        match sort {
            FileSort::Recent => self.repo().list_recent().await,
            FileSort::Popular => self.repo().list_popular().await,
        }
    }

    /// Search by original name. A blank keyword lists everything.
    pub async fn search(&self, keyword: &str) -> Result<Vec<StoredFile>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return self.repo().list_recent().await;
        }
        self.repo().search_by_name(keyword).await
    }

    /// List files of one kind.
    pub async fn filter(&self, filter: FileFilter) -> Result<Vec<StoredFile>> {
        match filter {
            FileFilter::Images => self.repo().list_by_content_type_prefix("image/").await,
            FileFilter::Videos => self.repo().list_by_content_type_prefix("video/").await,
            FileFilter::All => self.repo().list_recent().await,
        }
    }

    /// List files whose content type starts with `prefix`.
    pub async fn list_by_content_type(&self, prefix: &str) -> Result<Vec<StoredFile>> {
        self.repo().list_by_content_type_prefix(prefix).await
    }

    /// List files uploaded within a time range.
    pub async fn list_uploaded_between(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<StoredFile>> {
        self.repo().list_uploaded_between(start, end).await
    }

    /// Current storage usage.
    pub async fn storage_status(&self) -> Result<QuotaSnapshot> {
        self.accountant().snapshot().await
    }
}
