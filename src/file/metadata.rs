//! File metadata records.
//!
//! This module stores one `stored_files` row per managed file and provides
//! the aggregate queries the quota accountant relies on.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::datetime::{parse_db_datetime, to_db_datetime};
use crate::db::DbPool;
use crate::{FilehostError, Result};

const SELECT_COLUMNS: &str = "SELECT id, original_name, stored_name, file_path, file_size,
        content_type, upload_time, download_count, last_accessed
 FROM stored_files";

/// A file under management.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StoredFile {
    /// Record ID.
    pub id: i64,
    /// Name supplied by the client, for display only.
    pub original_name: String,
    /// Generated on-disk name.
    pub stored_name: String,
    /// Path of the physical file.
    pub file_path: String,
    /// Size in bytes, as written.
    pub file_size: i64,
    /// Declared content type.
    pub content_type: Option<String>,
    /// Upload time (UTC, SQLite format).
    pub upload_time: String,
    /// Number of successful downloads.
    pub download_count: i64,
    /// Time of the last download.
    pub last_accessed: Option<String>,
}

impl StoredFile {
    /// Parsed upload time.
    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        parse_db_datetime(&self.upload_time)
    }

    /// Check if the declared content type is an image type.
    pub fn is_image(&self) -> bool {
        self.has_type_prefix("image/")
    }

    /// Check if the declared content type is a video type.
    pub fn is_video(&self) -> bool {
        self.has_type_prefix("video/")
    }

    fn has_type_prefix(&self, prefix: &str) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().starts_with(prefix))
            .unwrap_or(false)
    }
}

/// Data for inserting a new record.
#[derive(Debug, Clone)]
pub struct NewStoredFile {
    pub original_name: String,
    pub stored_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_type: Option<String>,
}

/// Repository for stored file records.
pub struct FileRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a record and return it with its assigned ID.
    pub async fn create(&self, file: &NewStoredFile) -> Result<StoredFile> {
        let result = sqlx::query(
            "INSERT INTO stored_files
                (original_name, original_name_folded, stored_name, file_path, file_size, content_type)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&file.original_name)
        .bind(fold_name(&file.original_name))
        .bind(&file.stored_name)
        .bind(&file.file_path)
        .bind(file.file_size)
        .bind(&file.content_type)
        .execute(self.pool)
        .await
        .map_err(|e| FilehostError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| FilehostError::NotFound("file".to_string()))
    }

    /// Get a record by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<StoredFile>> {
        let query = format!("{SELECT_COLUMNS} WHERE id = ?");
        let file = sqlx::query_as::<_, StoredFile>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| FilehostError::Database(e.to_string()))?;

        Ok(file)
    }

    /// Get a record by its stored name.
    pub async fn get_by_stored_name(&self, stored_name: &str) -> Result<Option<StoredFile>> {
        let query = format!("{SELECT_COLUMNS} WHERE stored_name = ?");
        let file = sqlx::query_as::<_, StoredFile>(&query)
            .bind(stored_name)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| FilehostError::Database(e.to_string()))?;

        Ok(file)
    }

    /// Case-insensitive substring search over original names.
    ///
    /// `%` and `_` in the keyword match literally.
    pub async fn search_by_name(&self, keyword: &str) -> Result<Vec<StoredFile>> {
        let pattern = format!("%{}%", escape_like(&fold_name(keyword)));
        let query = format!(
            "{SELECT_COLUMNS} WHERE original_name_folded LIKE ? ESCAPE '\\'
             ORDER BY upload_time DESC, id DESC"
        );

        self.fetch_all_with(&query, pattern).await
    }

    /// List records whose content type starts with `prefix` (case-insensitive).
    pub async fn list_by_content_type_prefix(&self, prefix: &str) -> Result<Vec<StoredFile>> {
        let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));
        let query = format!(
            "{SELECT_COLUMNS} WHERE LOWER(content_type) LIKE ? ESCAPE '\\'
             ORDER BY upload_time DESC, id DESC"
        );

        self.fetch_all_with(&query, pattern).await
    }

    /// List all records, newest first.
    pub async fn list_recent(&self) -> Result<Vec<StoredFile>> {
        let query = format!("{SELECT_COLUMNS} ORDER BY upload_time DESC, id DESC");
        let files = sqlx::query_as::<_, StoredFile>(&query)
            .fetch_all(self.pool)
            .await
            .map_err(|e| FilehostError::Database(e.to_string()))?;

        Ok(files)
    }

    /// List all records, most downloaded first.
    pub async fn list_popular(&self) -> Result<Vec<StoredFile>> {
        let query = format!("{SELECT_COLUMNS} ORDER BY download_count DESC, id ASC");
        let files = sqlx::query_as::<_, StoredFile>(&query)
            .fetch_all(self.pool)
            .await
            .map_err(|e| FilehostError::Database(e.to_string()))?;

        Ok(files)
    }

    /// List records uploaded within `[start, end]`, newest first.
    pub async fn list_uploaded_between(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<StoredFile>> {
        let query = format!(
            "{SELECT_COLUMNS} WHERE upload_time BETWEEN ? AND ?
             ORDER BY upload_time DESC, id DESC"
        );
        let files = sqlx::query_as::<_, StoredFile>(&query)
            .bind(to_db_datetime(start))
            .bind(to_db_datetime(end))
            .fetch_all(self.pool)
            .await
            .map_err(|e| FilehostError::Database(e.to_string()))?;

        Ok(files)
    }

    /// Sum of the sizes of all live records.
    pub async fn total_size(&self) -> Result<i64> {
        let total: (i64,) = sqlx::query_as("SELECT COALESCE(SUM(file_size), 0) FROM stored_files")
            .fetch_one(self.pool)
            .await
            .map_err(|e| FilehostError::Database(e.to_string()))?;

        Ok(total.0)
    }

    /// Number of live records.
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stored_files")
            .fetch_one(self.pool)
            .await
            .map_err(|e| FilehostError::Database(e.to_string()))?;

        Ok(count.0)
    }

    /// Record a download: bump the counter and set the last-access time.
    ///
    /// Returns false if the record does not exist.
    pub async fn increment_downloads(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE stored_files
             SET download_count = download_count + 1, last_accessed = datetime('now')
             WHERE id = ?",
        )
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| FilehostError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a record by ID.
    ///
    /// Returns true if a record was deleted.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM stored_files WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| FilehostError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_all_with(&self, query: &str, param: String) -> Result<Vec<StoredFile>> {
        let files = sqlx::query_as::<_, StoredFile>(query)
            .bind(param)
            .fetch_all(self.pool)
            .await
            .map_err(|e| FilehostError::Database(e.to_string()))?;

        Ok(files)
    }
}

/// Lowercase a name for search.
///
/// Folding happens here rather than in SQL, whose `LOWER()` leaves
/// non-ASCII letters alone.
fn fold_name(name: &str) -> String {
    name.to_lowercase()
}

/// Escape LIKE wildcards with a backslash.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
