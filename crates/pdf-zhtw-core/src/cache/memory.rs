use moka::future::Cache;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

/// Unbounded in-memory memo using moka.
///
/// Scoped to one document conversion, so no eviction is configured. Lookups
/// that miss go through moka's entry API, which lets only one caller run the
/// initializer for a key while concurrent callers for the same key wait on it.
pub struct MemoryCache<K, V> {
    cache: Cache<K, V>,
}

impl<K, V> MemoryCache<K, V>
where
    K: Hash + Eq + Send + Sync + Clone + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: K, value: V) {
        self.cache.insert(key, value).await;
    }

    pub fn contains(&self, key: &K) -> bool {
        self.cache.contains_key(key)
    }

    /// Return the cached value, or run `init` and cache its `Ok` output.
    ///
    /// The flag is true when the value was already present. Errors are not
    /// cached; every waiter coalesced onto a failing initializer receives the
    /// same shared error.
    pub async fn get_or_try_insert_with<F, E>(&self, key: K, init: F) -> Result<(V, bool), Arc<E>>
    where
        F: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        let entry = self.cache.entry(key).or_try_insert_with(init).await?;
        let hit = !entry.is_fresh();
        Ok((entry.into_value(), hit))
    }

    /// Return the cached value, or compute and cache it.
    pub async fn get_with<F>(&self, key: K, init: F) -> V
    where
        F: Future<Output = V>,
    {
        self.cache.get_with(key, init).await
    }

    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl<K, V> Default for MemoryCache<K, V>
where
    K: Hash + Eq + Send + Sync + Clone + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_second_lookup_is_hit() {
        let cache: MemoryCache<String, String> = MemoryCache::new();
        let (v, hit) = cache
            .get_or_try_insert_with("a".to_string(), async { Ok::<_, ()>("x".to_string()) })
            .await
            .unwrap();
        assert_eq!(v, "x");
        assert!(!hit);

        let (v, hit) = cache
            .get_or_try_insert_with("a".to_string(), async { Ok::<_, ()>("y".to_string()) })
            .await
            .unwrap();
        assert_eq!(v, "x");
        assert!(hit);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: MemoryCache<String, String> = MemoryCache::new();
        let res = cache
            .get_or_try_insert_with("a".to_string(), async { Err::<String, _>("boom") })
            .await;
        assert!(res.is_err());
        assert!(!cache.contains(&"a".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_lookups_run_initializer_once() {
        let cache: Arc<MemoryCache<String, String>> = Arc::new(MemoryCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_insert_with("Error".to_string(), async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok::<_, ()>("錯誤".to_string())
                    })
                    .await
                    .unwrap()
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().0, "錯誤");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
