//! Bulk ZIP archives of stored files.
//!
//! Archives are written to a private temporary directory that is removed
//! when the returned [`ArchiveBundle`] is dropped.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::db::Database;
use crate::{FilehostError, Result};

use super::metadata::FileRepository;
use super::storage::FileStorage;

/// Bundle name used when archiving every file.
pub const ALL_FILES_BUNDLE_NAME: &str = "all_files";

/// Bundle name used for an explicit selection without a name.
const DEFAULT_BUNDLE_NAME: &str = "files";

/// Which files go into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSelection {
    /// The given record IDs, in order. Unknown IDs are skipped.
    Ids(Vec<i64>),
    /// Every live file.
    All,
}

impl ArchiveSelection {
    fn default_bundle_name(&self) -> &'static str {
        match self {
            ArchiveSelection::Ids(_) => DEFAULT_BUNDLE_NAME,
            ArchiveSelection::All => ALL_FILES_BUNDLE_NAME,
        }
    }
}

/// A finished archive on disk.
///
/// The archive and its temporary directory are deleted on drop.
#[derive(Debug)]
pub struct ArchiveBundle {
    /// Location of the ZIP file.
    pub path: PathBuf,
    /// Download name, ending in `.zip`.
    pub file_name: String,
    /// Number of files written.
    pub entry_count: usize,
    /// Requested files that were left out because the record or the
    /// physical file was missing.
    pub skipped: usize,
    dir: Option<TempDir>,
}

impl ArchiveBundle {
    /// Open the archive for reading.
    pub async fn open(&self) -> io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }

    /// Size of the archive in bytes.
    pub async fn size(&self) -> io::Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }
}

impl Drop for ArchiveBundle {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(path = ?path, "Removed temporary archive"),
                Err(e) => warn!(path = ?path, error = %e, "Failed to remove temporary archive"),
            }
        }
    }
}

/// A file resolved for inclusion.
struct ArchiveSource {
    entry_name: String,
    path: PathBuf,
}

/// Builds ZIP archives from stored files.
pub struct ArchiveBuilder<'a> {
    db: &'a Database,
    storage: &'a FileStorage,
}

impl<'a> ArchiveBuilder<'a> {
    /// Create a new ArchiveBuilder.
    pub fn new(db: &'a Database, storage: &'a FileStorage) -> Self {
        Self { db, storage }
    }

    /// Build an archive of the selected files.
    ///
    /// Entries are named by original name. Missing records and missing
    /// physical files are skipped, so the archive may be empty.
    pub async fn build(
        &self,
        selection: &ArchiveSelection,
        bundle_name: Option<&str>,
    ) -> Result<ArchiveBundle> {
        let repo = FileRepository::new(self.db.pool());

        let (records, mut skipped) = match selection {
            ArchiveSelection::All => (repo.list_recent().await?, 0),
            ArchiveSelection::Ids(ids) => {
                let mut records = Vec::with_capacity(ids.len());
                let mut missing = 0;
                for &id in ids {
                    match repo.get_by_id(id).await? {
                        Some(record) => records.push(record),
                        None => {
                            debug!(id, "Archive skipped unknown file");
                            missing += 1;
                        }
                    }
                }
                (records, missing)
            }
        };

        let sources: Vec<ArchiveSource> = records
            .into_iter()
            .map(|record| ArchiveSource {
                entry_name: record.original_name,
                path: self.storage.get_file_path(&record.stored_name),
            })
            .collect();

        let file_name = bundle_file_name(bundle_name, selection.default_bundle_name());
        let dir = tempfile::Builder::new().prefix("filehost_zip").tempdir()?;
        let path = dir.path().join(&file_name);

        let zip_path = path.clone();
        let (entry_count, missing_files) =
            tokio::task::spawn_blocking(move || write_archive(&zip_path, &sources))
                .await
                .map_err(|e| FilehostError::Archive(e.to_string()))??;
        skipped += missing_files;

        info!(
            file_name = %file_name,
            entries = entry_count,
            skipped,
            "Archive created"
        );

        Ok(ArchiveBundle {
            path,
            file_name,
            entry_count,
            skipped,
            dir: Some(dir),
        })
    }
}

/// Write `sources` into a new ZIP file at `path`.
///
/// Returns the number of entries written and the number of sources whose
/// file was missing.
fn write_archive(path: &Path, sources: &[ArchiveSource]) -> Result<(usize, usize)> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    let mut used_names = HashSet::new();
    let mut written = 0;
    let mut missing = 0;

    for source in sources {
        let mut input = match File::open(&source.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = ?source.path, "Archive skipped missing file");
                missing += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let entry_name = unique_entry_name(&source.entry_name, &mut used_names);
        zip.start_file(entry_name, options)?;
        io::copy(&mut input, &mut zip)?;
        written += 1;
    }

    zip.finish()?;
    Ok((written, missing))
}

/// Make an entry name safe and unique within the archive.
///
/// Path separators are replaced so entries cannot escape the extraction
/// directory. Repeats become `name (1).ext`, `name (2).ext` and so on.
fn unique_entry_name(original: &str, used: &mut HashSet<String>) -> String {
    let mut base: String = original
        .chars()
        .map(|c| if matches!(c, '/' | '\\') || c.is_control() { '_' } else { c })
        .collect();
    if base.trim().is_empty() || base == "." || base == ".." {
        base = "unnamed".to_string();
    }

    if used.insert(base.clone()) {
        return base;
    }

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
        _ => (base.clone(), String::new()),
    };

    let mut n = 1;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Build the download name for a bundle.
fn bundle_file_name(requested: Option<&str>, default: &str) -> String {
    let cleaned: String = requested
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '/' | '\\' | '"'))
        .collect();
    let cleaned = cleaned.trim_matches('.');

    let name = if cleaned.is_empty() { default } else { cleaned };
    if name.to_ascii_lowercase().ends_with(".zip") {
        name.to_string()
    } else {
        format!("{name}.zip")
    }
}
