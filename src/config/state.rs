// Application state module
// Shared, read-only state handed to every request handler

use std::sync::Arc;

use super::types::Config;
use crate::cache::LocalCache;
use crate::storage::ObjectStore;

/// Application state
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ObjectStore>,
    pub cache: LocalCache,
    /// URL prefix of the download route, derived from `config.cache_dir`
    pub download_prefix: String,
}

impl AppState {
    /// Wire the store into a cache rooted at `config.cache_dir`
    pub fn new(config: Config, store: Arc<dyn ObjectStore>) -> Self {
        let cache = LocalCache::new(&config.cache_dir, Arc::clone(&store));
        Self::with_cache(config, store, cache)
    }

    /// Use an explicit cache (e.g. rooted somewhere other than the working directory)
    pub fn with_cache(config: Config, store: Arc<dyn ObjectStore>, cache: LocalCache) -> Self {
        let download_prefix = config.download_prefix();
        Self {
            config,
            store,
            cache,
            download_prefix,
        }
    }
}
