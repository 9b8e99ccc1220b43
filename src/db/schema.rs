//! Database schema and migrations for filehost.
//!
//! Migrations are applied in order; the `schema_version` table records
//! which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: stored file metadata
    r#"
CREATE TABLE stored_files (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    original_name   TEXT NOT NULL,                 -- user-supplied display name
    stored_name     TEXT NOT NULL UNIQUE,          -- generated on-disk name
    file_path       TEXT NOT NULL,
    file_size       INTEGER NOT NULL CHECK (file_size >= 0),
    content_type    TEXT,
    upload_time     TEXT NOT NULL DEFAULT (datetime('now')),
    download_count  INTEGER NOT NULL DEFAULT 0,
    last_accessed   TEXT
);

CREATE INDEX idx_stored_files_upload_time ON stored_files(upload_time);
CREATE INDEX idx_stored_files_download_count ON stored_files(download_count);
CREATE INDEX idx_stored_files_content_type ON stored_files(content_type);
"#,
    // v2: Unicode-folded name for case-insensitive search.
    // SQLite's LOWER() only folds ASCII; the backfill below is replaced by
    // the Rust-folded value for every row written afterwards.
    r#"
ALTER TABLE stored_files ADD COLUMN original_name_folded TEXT NOT NULL DEFAULT '';
UPDATE stored_files SET original_name_folded = LOWER(original_name);
CREATE INDEX idx_stored_files_original_name_folded ON stored_files(original_name_folded);
"#,
];
