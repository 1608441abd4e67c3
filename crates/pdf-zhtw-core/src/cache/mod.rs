mod memory;
mod disk;
mod key;

pub use memory::MemoryCache;
pub use disk::DiskCache;
pub use key::CacheKey;

use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use crate::config::{CacheConfig, Lang};
use crate::error::Result;

/// Translation memo for one document conversion.
///
/// An unbounded memory layer, optionally backed by a persistent disk layer.
/// Concurrent lookups for the same key share one backend call.
pub struct TranslationCache {
    memory: MemoryCache<CacheKey, String>,
    disk: Option<DiskCache>,
    backend_identity: String,
}

impl TranslationCache {
    /// Memory-only cache
    pub fn in_memory() -> Self {
        Self {
            memory: MemoryCache::new(),
            disk: None,
            backend_identity: String::new(),
        }
    }

    /// Create a cache from configuration.
    ///
    /// `backend_identity` namespaces persisted entries.
    pub fn new(config: &CacheConfig, backend_identity: impl Into<String>) -> Result<Self> {
        let disk = if config.persist {
            let path = config
                .disk_path
                .clone()
                .unwrap_or_else(crate::util::translation_cache_path);
            Some(DiskCache::new(path)?)
        } else {
            None
        };

        Ok(Self {
            memory: MemoryCache::new(),
            disk,
            backend_identity: backend_identity.into(),
        })
    }

    /// Get a cached translation
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        if let Some(value) = self.memory.get(key).await {
            return Some(value);
        }

        if let Some(value) = self.disk_get(key) {
            self.memory.insert(key.clone(), value.clone()).await;
            return Some(value);
        }

        None
    }

    /// Store a translation
    pub async fn insert(&self, key: &CacheKey, value: String) {
        self.disk_put(key, &value);
        self.memory.insert(key.clone(), value).await;
    }

    /// Return the cached translation or obtain one through `init`.
    ///
    /// The flag reports a cache hit. Only successful translations are stored.
    pub async fn get_or_translate<F, E>(&self, key: &CacheKey, init: F) -> std::result::Result<(String, bool), Arc<E>>
    where
        F: Future<Output = std::result::Result<String, E>>,
        E: Send + Sync + 'static,
    {
        if !self.memory.contains(key)
            && let Some(value) = self.disk_get(key)
        {
            self.memory.insert(key.clone(), value.clone()).await;
            return Ok((value, true));
        }

        let (value, hit) = self.memory.get_or_try_insert_with(key.clone(), init).await?;
        if !hit {
            self.disk_put(key, &value);
        }
        Ok((value, hit))
    }

    /// Check if a key exists in cache
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.memory.contains(key)
            || self
                .disk
                .as_ref()
                .is_some_and(|disk| disk.get(&key.disk_key(&self.backend_identity), key.as_str()).is_some())
    }

    /// Number of entries held in memory for this conversion
    pub async fn len(&self) -> u64 {
        self.memory.len().await
    }

    /// Clear both layers
    pub fn clear(&self) {
        self.memory.clear();
        if let Some(ref disk) = self.disk
            && let Err(e) = disk.clear()
        {
            warn!("Failed to clear disk cache: {}", e);
        }
    }

    fn disk_get(&self, key: &CacheKey) -> Option<String> {
        self.disk
            .as_ref()
            .and_then(|disk| disk.get(&key.disk_key(&self.backend_identity), key.as_str()))
    }

    fn disk_put(&self, key: &CacheKey, value: &str) {
        if let Some(ref disk) = self.disk
            && let Err(e) = disk.insert(&key.disk_key(&self.backend_identity), key.as_str(), value)
        {
            warn!("Failed to persist translation: {}", e);
        }
    }
}

/// Language detection memo for one document conversion.
///
/// Keyed by normalized text; `None` records an `Unknown` classification.
#[derive(Default)]
pub struct DetectionCache {
    memory: MemoryCache<CacheKey, Option<Lang>>,
}

impl DetectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized classification or compute it with `classify`.
    pub async fn get_or_classify<F>(&self, key: &CacheKey, classify: F) -> Option<Lang>
    where
        F: FnOnce(&str) -> Option<Lang>,
    {
        let text = key.as_str();
        self.memory.get_with(key.clone(), async { classify(text) }).await
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.memory.contains(key)
    }
}
