//! Physical file storage for filehost.
//!
//! Files live in a single flat directory under their stored names:
//! ```text
//! {base_path}/
//! ├── 20240115_103000_3f9a1c0b7d2e.pdf
//! ├── 20240115_103001_a07c44e91b3f.png
//! └── 20240115_103001_d21e08f5c6aa
//! ```

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::Result;

/// File storage service for managing physical files.
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Base directory for file storage.
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage with the given base path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the full path for a stored name.
    pub fn get_file_path(&self, stored_name: &str) -> PathBuf {
        self.base_path.join(stored_name)
    }

    /// Create a new, empty file named `stored_name`.
    ///
    /// The file is created exclusively: an existing file yields
    /// `ErrorKind::AlreadyExists` and is left untouched.
    pub async fn create(&self, stored_name: &str) -> io::Result<File> {
        fs::create_dir_all(&self.base_path).await?;

        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.get_file_path(stored_name))
            .await
    }

    /// Copy `reader` into `file` and sync it. Returns the bytes written.
    pub async fn fill<R>(mut file: File, reader: &mut R) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let written = tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;

        Ok(written)
    }

    /// Stream `reader` into a new file named `stored_name`.
    ///
    /// See [`FileStorage::create`] for collision behavior. A partially
    /// written file is left behind on error.
    pub async fn write_stream<R>(&self, stored_name: &str, reader: &mut R) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let file = self.create(stored_name).await?;
        Self::fill(file, reader).await
    }

    /// Open a stored file for reading.
    pub async fn open(&self, stored_name: &str) -> io::Result<File> {
        File::open(self.get_file_path(stored_name)).await
    }

    /// Delete a file from storage.
    ///
    /// Returns false if the file was already gone.
    pub async fn delete(&self, stored_name: &str) -> io::Result<bool> {
        match fs::remove_file(self.get_file_path(stored_name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check if a file exists in storage.
    pub async fn exists(&self, stored_name: &str) -> bool {
        fs::metadata(self.get_file_path(stored_name))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Get the size of a stored file.
    pub async fn file_size(&self, stored_name: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.get_file_path(stored_name)).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("files")).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_new_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage_path = temp_dir.path().join("new_storage");

        assert!(!storage_path.exists());
        let storage = FileStorage::new(&storage_path).unwrap();
        assert!(storage_path.exists());
        assert_eq!(storage.base_path(), storage_path);
    }

    #[test]
    fn test_get_file_path() {
        let storage = FileStorage::new(std::env::temp_dir().join("filehost_path_test")).unwrap();
        let path = storage.get_file_path("20240115_103000_abc.txt");
        assert!(path.ends_with("20240115_103000_abc.txt"));
        assert_eq!(path.parent(), Some(storage.base_path()));
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let (_temp, storage) = setup();
        let content = b"Hello, World!";

        let written = storage
            .write_stream("hello.txt", &mut &content[..])
            .await
            .unwrap();

        assert_eq!(written, content.len() as u64);
        assert!(storage.exists("hello.txt").await);
        assert_eq!(storage.file_size("hello.txt").await.unwrap(), 13);
        assert_eq!(
            std::fs::read(storage.get_file_path("hello.txt")).unwrap(),
            content
        );
    }

    #[tokio::test]
    async fn test_write_recreates_missing_directory() {
        let (_temp, storage) = setup();
        std::fs::remove_dir_all(storage.base_path()).unwrap();

        let written = storage
            .write_stream("again.txt", &mut &b"data"[..])
            .await
            .unwrap();

        assert_eq!(written, 4);
        assert!(storage.exists("again.txt").await);
    }

    #[tokio::test]
    async fn test_write_refuses_existing_name() {
        let (_temp, storage) = setup();
        storage
            .write_stream("same.txt", &mut &b"first"[..])
            .await
            .unwrap();

        let err = storage
            .write_stream("same.txt", &mut &b"second"[..])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(
            std::fs::read(storage.get_file_path("same.txt")).unwrap(),
            b"first"
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let (_temp, storage) = setup();
        storage
            .write_stream("gone.txt", &mut &b"x"[..])
            .await
            .unwrap();

        assert!(storage.delete("gone.txt").await.unwrap());
        assert!(!storage.exists("gone.txt").await);
        assert!(!storage.delete("gone.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_open_missing() {
        let (_temp, storage) = setup();
        let err = storage.open("missing.bin").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
