//! Local pull-through cache
//!
//! Maps a request path to a file in the cache directory and downloads the
//! object from the store on a miss. Cached files are never revalidated.
//!
//! Concurrent misses for the same key are serialized by a per-key lock, so a
//! key is downloaded at most once; other requests wait and then find the file.

use crate::error::{ProxyError, Result};
use crate::storage::ObjectStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Outcome of resolving a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Object key, the final segment of the request path
    pub key: String,
    /// Local file holding the object
    pub path: PathBuf,
    /// Bytes downloaded to fill the cache, `None` on a hit
    pub fetched_bytes: Option<u64>,
}

impl Resolved {
    pub const fn is_hit(&self) -> bool {
        self.fetched_bytes.is_none()
    }
}

type DownloadLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

pub struct LocalCache {
    root: PathBuf,
    store: Arc<dyn ObjectStore>,
    download_locks: Arc<DownloadLocks>,
}

impl LocalCache {
    pub fn new(root: impl Into<PathBuf>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            root: root.into(),
            store,
            download_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a request path to a local file, downloading it on a miss.
    ///
    /// Only the final path segment is used, both as file name and object key.
    pub async fn resolve(&self, request_path: &str) -> Result<Resolved> {
        let key = object_key(request_path)
            .ok_or_else(|| ProxyError::NotFound(format!("no object key in '{request_path}'")))?;
        let path = self.root.join(key);

        if is_cached(&path).await {
            return Ok(hit(key, path));
        }

        let _guard = KeyLock::acquire(&self.download_locks, key).await;

        // Another request may have filled the cache while we waited
        if is_cached(&path).await {
            return Ok(hit(key, path));
        }

        let bytes = self.store.download_object(key, &path).await?;
        Ok(Resolved {
            key: key.to_string(),
            path,
            fetched_bytes: Some(bytes),
        })
    }

    #[cfg(test)]
    fn pending_locks(&self) -> usize {
        self.download_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn hit(key: &str, path: PathBuf) -> Resolved {
    Resolved {
        key: key.to_string(),
        path,
        fetched_bytes: None,
    }
}

/// Final path segment used as object key and cache file name.
///
/// Returns `None` for empty and dot-prefixed segments.
pub fn object_key(request_path: &str) -> Option<&str> {
    let key = request_path.rsplit('/').next()?;
    // Dot-prefixed names cover `.`, `..` and in-flight download files
    if key.is_empty() || key.starts_with('.') || key.contains('\\') {
        return None;
    }
    Some(key)
}

async fn is_cached(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

/// Create the cache directory (and parents) readable only by the owner
pub async fn ensure_cache_dir(path: &Path) -> std::io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(path).await
}

/// Held per-key download lock; drops the map entry once nobody else needs it
struct KeyLock {
    locks: Arc<DownloadLocks>,
    key: String,
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

impl KeyLock {
    async fn acquire(locks: &Arc<DownloadLocks>, key: &str) -> Self {
        let mutex = {
            let mut map = locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        let guard = mutex.lock_owned().await;
        Self {
            locks: Arc::clone(locks),
            key: key.to_string(),
            _guard: guard,
        }
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Entry held by the map plus our guard only: no waiters left
        if map
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) <= 2)
        {
            map.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::time::Duration;

    fn cache_with(store: &Arc<MemoryStore>, root: &Path) -> LocalCache {
        LocalCache::new(root, Arc::clone(store) as Arc<dyn ObjectStore>)
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("/download/a.txt"), Some("a.txt"));
        assert_eq!(object_key("download/nested/b.bin"), Some("b.bin"));
        assert_eq!(object_key("c"), Some("c"));
        assert_eq!(object_key("/download/"), None);
        assert_eq!(object_key("/download/.."), None);
        assert_eq!(object_key("/download/."), None);
        assert_eq!(object_key("/download/..\\secret"), None);
        assert_eq!(object_key("/download/.staging-abc.part"), None);
        assert_eq!(object_key("/download/.hidden"), None);
        assert_eq!(object_key("/download/a.txt.part"), Some("a.txt.part"));
    }

    #[tokio::test]
    async fn test_miss_downloads_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new().with_object("a.txt", "hello"));
        let cache = cache_with(&store, dir.path());
        assert_eq!(cache.root(), dir.path());

        let first = cache.resolve("/download/a.txt").await.unwrap();
        assert_eq!(first.fetched_bytes, Some(5));
        assert_eq!(first.path, dir.path().join("a.txt"));
        assert_eq!(std::fs::read(&first.path).unwrap(), b"hello");
        assert_eq!(store.download_calls(), 1);

        let second = cache.resolve("/download/a.txt").await.unwrap();
        assert!(second.is_hit());
        assert_eq!(second.path, first.path);
        assert_eq!(std::fs::read(&second.path).unwrap(), b"hello");
        assert_eq!(store.download_calls(), 1);
        assert_eq!(cache.pending_locks(), 0);
    }

    #[tokio::test]
    async fn test_hit_makes_no_remote_call() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("local.txt"), "cached").unwrap();
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(&store, dir.path());

        let resolved = cache.resolve("/download/local.txt").await.unwrap();
        assert!(resolved.is_hit());
        assert_eq!(resolved.key, "local.txt");
        assert_eq!(store.download_calls(), 0);
    }

    #[tokio::test]
    async fn test_absent_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(&store, dir.path());

        let err = cache.resolve("/download/c.txt").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!dir.path().join("c.txt").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(cache.pending_locks(), 0);
    }

    #[tokio::test]
    async fn test_invalid_key_skips_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(&store, dir.path());

        assert!(cache.resolve("/download/..").await.unwrap_err().is_not_found());
        assert!(cache.resolve("/download/").await.unwrap_err().is_not_found());
        assert_eq!(store.download_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_cache_dir_is_local_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new().with_object("a.txt", "hello"));
        let cache = cache_with(&store, &dir.path().join("gone"));

        let err = cache.resolve("/download/a.txt").await.unwrap_err();
        assert!(matches!(err, ProxyError::LocalIoError(_)));
        assert_eq!(store.download_calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_download_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryStore::new()
                .with_object("big.bin", vec![7u8; 4096])
                .with_download_delay(Duration::from_millis(50)),
        );
        let cache = Arc::new(cache_with(&store, dir.path()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.resolve("/download/big.bin").await })
            })
            .collect();

        let mut fetched = 0;
        for task in tasks {
            let resolved = task.await.unwrap().unwrap();
            assert_eq!(std::fs::metadata(&resolved.path).unwrap().len(), 4096);
            if !resolved.is_hit() {
                fetched += 1;
            }
        }
        assert_eq!(fetched, 1);
        assert_eq!(store.download_calls(), 1);
        assert_eq!(cache.pending_locks(), 0);
    }

    #[tokio::test]
    async fn test_ensure_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("download");
        ensure_cache_dir(&target).await.unwrap();
        ensure_cache_dir(&target).await.unwrap();
        assert!(target.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&target).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    fn cache_entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_in_flight_download_is_not_served() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryStore::new()
                .with_object("a.txt", "hello")
                .with_download_delay(Duration::from_millis(200)),
        );
        let cache = Arc::new(cache_with(&store, dir.path()));

        let pending = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.resolve("/download/a.txt").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let staged = cache_entries(dir.path());
        assert_eq!(staged.len(), 1);
        let err = cache
            .resolve(&format!("/download/{}", staged[0]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        // A real key that looks like a stage goes to the store
        let err = cache.resolve("/download/a.txt.part").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!dir.path().join("a.txt.part").exists());

        let resolved = pending.await.unwrap().unwrap();
        assert_eq!(std::fs::read(&resolved.path).unwrap(), b"hello");
        assert_eq!(cache_entries(dir.path()), vec!["a.txt"]);
    }

    #[tokio::test]
    async fn test_cancelled_download_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            MemoryStore::new()
                .with_object("a.txt", "hello")
                .with_download_delay(Duration::from_millis(200)),
        );
        let cache = cache_with(&store, dir.path());

        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), cache.resolve("/download/a.txt")).await;
        assert!(timed_out.is_err());
        assert!(cache_entries(dir.path()).is_empty());
        assert_eq!(cache.pending_locks(), 0);

        // The next request downloads the object in full
        let resolved = cache.resolve("/download/a.txt").await.unwrap();
        assert_eq!(resolved.fetched_bytes, Some(5));
        assert_eq!(std::fs::read(&resolved.path).unwrap(), b"hello");
        assert_eq!(store.download_calls(), 2);
    }
}
