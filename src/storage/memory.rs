//! In-process object store
//!
//! Holds objects in memory and counts the calls made against it. Used as a
//! stand-in for S3 in tests and local runs without credentials.

use super::{ObjectStore, StagedFile};
use crate::error::{ProxyError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: BTreeMap<String, Vec<u8>>,
    missing_bucket: bool,
    download_delay: Option<Duration>,
    list_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object; keys are listed in lexicographic order like S3
    #[must_use]
    pub fn with_object(mut self, key: &str, data: impl Into<Vec<u8>>) -> Self {
        self.objects.insert(key.to_string(), data.into());
        self
    }

    /// Behave as if the bucket does not exist
    #[must_use]
    pub const fn without_bucket(mut self) -> Self {
        self.missing_bucket = true;
        self
    }

    /// Slow every download down, to widen race windows in tests
    #[must_use]
    pub const fn with_download_delay(mut self, delay: Duration) -> Self {
        self.download_delay = Some(delay);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    fn check_bucket(&self) -> Result<()> {
        if self.missing_bucket {
            return Err(ProxyError::NotFound("NoSuchBucket".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(&self, max_keys: i32) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_bucket()?;
        let limit = usize::try_from(max_keys).unwrap_or(0);
        Ok(self.objects.keys().take(limit).cloned().collect())
    }

    async fn download_object(&self, key: &str, destination: &Path) -> Result<u64> {
        let mut staged = StagedFile::create(destination)?;
        self.download_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }

        self.check_bucket()?;
        let data = self
            .objects
            .get(key)
            .ok_or_else(|| ProxyError::NotFound(format!("NoSuchKey: {key}")))?;

        staged.write(data).await?;
        staged.commit().await
    }
}
