//! Storage client adapter
//!
//! Object store operations used by the proxy. Bucket and region are bound when
//! the store is constructed; callers only pass keys and destinations.

pub mod memory;
mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Remote object store backing the local cache
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List object keys in store order, at most `max_keys` of them.
    ///
    /// A missing bucket is reported as `NotFound`.
    async fn list_objects(&self, max_keys: i32) -> Result<Vec<String>>;

    /// Download `key` into `destination` and return the number of bytes written.
    ///
    /// The destination is created before the store is contacted, so a local
    /// failure surfaces as `LocalIoError` without any remote call.
    async fn download_object(&self, key: &str, destination: &Path) -> Result<u64>;
}

/// Name prefix of in-flight download files; never a valid object key
pub const STAGING_PREFIX: &str = ".staging-";

/// Download target staged in a hidden temporary file next to its final path.
///
/// `commit` renames the temporary file into place. Dropping an uncommitted
/// stage (failure, cancellation) deletes it, so a half-written object never
/// shows up under the final name.
pub struct StagedFile {
    file: File,
    staging: TempPath,
    destination: PathBuf,
    written: u64,
}

impl StagedFile {
    pub fn create(destination: &Path) -> Result<Self> {
        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let (file, staging) = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".part")
            .tempfile_in(dir)?
            .into_parts();
        Ok(Self {
            file: File::from_std(file),
            staging,
            destination: destination.to_path_buf(),
            written: 0,
        })
    }

    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush and move the staged file to its destination, returning its size
    pub async fn commit(self) -> Result<u64> {
        let Self {
            mut file,
            staging,
            destination,
            written,
        } = self;

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        // On failure the returned TempPath is dropped and removes the stage
        staging.persist(&destination).map_err(|e| e.error)?;
        Ok(written)
    }

    /// Path of the temporary file while the stage is in flight
    pub fn staging_path(&self) -> &Path {
        &self.staging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_staged_file_commit() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.txt");

        let mut staged = StagedFile::create(&dest).unwrap();
        staged.write(b"hel").await.unwrap();
        staged.write(b"lo").await.unwrap();
        assert!(!dest.exists());
        assert!(staged.staging_path().exists());

        let names = entries(dir.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with(STAGING_PREFIX));
        assert!(names[0].ends_with(".part"));

        assert_eq!(staged.commit().await.unwrap(), 5);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        assert_eq!(entries(dir.path()), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_staged_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("b.txt");

        let mut staged = StagedFile::create(&dest).unwrap();
        staged.write(b"partial").await.unwrap();
        drop(staged);

        assert!(!dest.exists());
        assert!(entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_stages_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("c.txt");

        let first = StagedFile::create(&dest).unwrap();
        let second = StagedFile::create(&dest).unwrap();
        assert_ne!(first.staging_path(), second.staging_path());
    }

    #[test]
    fn test_staged_file_create_fails_in_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("c.txt");
        let result = StagedFile::create(&dest);
        assert!(matches!(result, Err(crate::error::ProxyError::LocalIoError(_))));
    }
}
