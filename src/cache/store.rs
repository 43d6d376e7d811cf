//! Time-based read-through page cache.

use std::future::Future;
use std::sync::{Arc, RwLock};

use lru::LruCache;
use metrics::{counter, gauge};
use tokio::time::Instant;
use tracing::debug;

use super::config::CacheConfig;
use super::keys::PageKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_HIT: &str = "fernlog_page_cache_hit_total";
const METRIC_MISS: &str = "fernlog_page_cache_miss_total";
const METRIC_EXPIRED: &str = "fernlog_page_cache_expired_total";
const METRIC_EVICT: &str = "fernlog_page_cache_evict_total";
const METRIC_COMPUTE_ERROR: &str = "fernlog_page_cache_compute_error_total";
const METRIC_ENTRIES: &str = "fernlog_page_cache_entries";

struct CacheEntry<V> {
    value: Arc<V>,
    stored_at: Instant,
}

enum Lookup<V> {
    Hit(Arc<V>),
    Miss,
    Expired,
}

/// Rendered pages keyed by (scope, page), served until their TTL elapses.
///
/// Writes elsewhere never invalidate entries; a page stays stale until it
/// expires or the cache is cleared. No lock is held while a value is being
/// computed, so concurrent misses on one key may each compute, and the last
/// one to finish wins.
pub struct PageCache<V> {
    config: CacheConfig,
    entries: RwLock<LruCache<String, CacheEntry<V>>>,
}

impl<V> PageCache<V>
where
    V: Send + Sync,
{
    pub fn new(config: CacheConfig) -> Self {
        let capacity = config.max_entries_non_zero();
        Self {
            config,
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached value for `key`, or run `compute` and store its
    /// result. Failures are returned to the caller and never stored.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &PageKey, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let scope = key.scope.kind();
        if !self.config.enabled {
            return compute().await.map(Arc::new);
        }

        let encoded = key.encode();
        match self.lookup(&encoded) {
            Lookup::Hit(value) => {
                counter!(METRIC_HIT, "scope" => scope).increment(1);
                return Ok(value);
            }
            Lookup::Expired => {
                counter!(METRIC_EXPIRED, "scope" => scope).increment(1);
                debug!(target = "fernlog::cache", key = %encoded, "page expired");
            }
            Lookup::Miss => {}
        }
        counter!(METRIC_MISS, "scope" => scope).increment(1);

        let value = match compute().await {
            Ok(value) => Arc::new(value),
            Err(err) => {
                counter!(METRIC_COMPUTE_ERROR, "scope" => scope).increment(1);
                return Err(err);
            }
        };

        self.insert(encoded, value.clone());
        Ok(value)
    }

    /// Drop every page.
    pub fn clear(&self) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        let dropped = entries.len();
        entries.clear();
        gauge!(METRIC_ENTRIES).set(0.0);
        debug!(target = "fernlog::cache", dropped, "page cache cleared");
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, encoded: &str) -> Lookup<V> {
        let mut entries = rw_write(&self.entries, SOURCE, "lookup");
        match entries.get(encoded) {
            None => return Lookup::Miss,
            Some(entry) if entry.stored_at.elapsed() < self.config.ttl => {
                return Lookup::Hit(entry.value.clone());
            }
            Some(_) => {}
        }
        entries.pop(encoded);
        gauge!(METRIC_ENTRIES).set(entries.len() as f64);
        Lookup::Expired
    }

    fn insert(&self, encoded: String, value: Arc<V>) {
        let mut entries = rw_write(&self.entries, SOURCE, "insert");
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };
        if let Some((evicted, _)) = entries.push(encoded.clone(), entry) {
            if evicted != encoded {
                counter!(METRIC_EVICT).increment(1);
                debug!(target = "fernlog::cache", key = %evicted, "page evicted");
            }
        }
        gauge!(METRIC_ENTRIES).set(entries.len() as f64);
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::application::pagination::PageIndex;
    use crate::domain::scope::FeedScope;

    fn key(page: i64) -> PageKey {
        PageKey::new(FeedScope::All, PageIndex::new(page))
    }

    fn cache(ttl_secs: u64, max_entries: usize) -> PageCache<String> {
        PageCache::new(CacheConfig {
            enabled: true,
            ttl: Duration::from_secs(ttl_secs),
            max_entries,
        })
    }

    async fn fetch(
        cache: &PageCache<String>,
        key: &PageKey,
        calls: &AtomicUsize,
    ) -> Arc<String> {
        cache
            .get_or_compute(key, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok::<_, std::convert::Infallible>(format!("render #{n}"))
            })
            .await
            .expect("infallible")
    }

    #[tokio::test(start_paused = true)]
    async fn serves_stale_value_until_ttl_then_recomputes() {
        let cache = cache(20, 16);
        let calls = AtomicUsize::new(0);

        let first = fetch(&cache, &key(1), &calls).await;
        tokio::time::advance(Duration::from_secs(19)).await;
        let second = fetch(&cache, &key(1), &calls).await;
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        let third = fetch(&cache, &key(1), &calls).await;
        assert_eq!(third.as_str(), "render #2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_forces_recompute() {
        let cache = cache(60, 16);
        let calls = AtomicUsize::new(0);

        fetch(&cache, &key(1), &calls).await;
        fetch(&cache, &key(2), &calls).await;
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        let again = fetch(&cache, &key(1), &calls).await;
        assert_eq!(again.as_str(), "render #3");
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let cache = cache(60, 16);
        let calls = AtomicUsize::new(0);
        let other = PageKey::new(
            FeedScope::ByAuthor(crate::domain::types::Username::parse("leo").unwrap()),
            PageIndex::FIRST,
        );

        let a = fetch(&cache, &key(1), &calls).await;
        let b = fetch(&cache, &other, &calls).await;

        assert_ne!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_compute_is_not_stored() {
        let cache = cache(60, 16);
        let calls = AtomicUsize::new(0);

        let err = cache
            .get_or_compute(&key(1), || async { Err::<String, _>("store unavailable") })
            .await
            .expect_err("compute failure propagates");
        assert_eq!(err, "store unavailable");
        assert!(cache.is_empty());

        let value = fetch(&cache, &key(1), &calls).await;
        assert_eq!(value.as_str(), "render #1");
    }

    #[tokio::test]
    async fn lru_bound_evicts_oldest_page() {
        let cache = cache(60, 2);
        let calls = AtomicUsize::new(0);

        fetch(&cache, &key(1), &calls).await;
        fetch(&cache, &key(2), &calls).await;
        fetch(&cache, &key(3), &calls).await;
        assert_eq!(cache.len(), 2);

        let recomputed = fetch(&cache, &key(1), &calls).await;
        assert_eq!(recomputed.as_str(), "render #4");
    }

    #[tokio::test]
    async fn disabled_cache_always_computes() {
        let cache = PageCache::new(CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        });
        let calls = AtomicUsize::new(0);

        fetch(&cache, &key(1), &calls).await;
        fetch(&cache, &key(1), &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_compute_leaves_no_entry() {
        let cache = cache(60, 16);
        let calls = AtomicUsize::new(0);

        let abandoned = tokio::time::timeout(
            Duration::from_secs(1),
            cache.get_or_compute(&key(1), || {
                std::future::pending::<Result<String, std::convert::Infallible>>()
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(cache.is_empty());

        assert_eq!(fetch(&cache, &key(1), &calls).await.as_str(), "render #1");
    }

    #[tokio::test]
    async fn concurrent_misses_leave_one_consistent_entry() {
        let cache = cache(60, 16);
        let calls = AtomicUsize::new(0);

        let (k1, k2) = (key(1), key(1));
        let (a, b) = tokio::join!(fetch(&cache, &k1, &calls), fetch(&cache, &k2, &calls));
        assert!(a.starts_with("render #"));
        assert!(b.starts_with("render #"));
        assert_eq!(cache.len(), 1);

        let cached = fetch(&cache, &key(1), &calls).await;
        assert!(cached == a || cached == b);
    }

    #[tokio::test]
    async fn recovers_from_poisoned_lock() {
        let cache = cache(60, 16);
        let calls = AtomicUsize::new(0);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache.entries.write().expect("entries lock");
            panic!("poison entries lock");
        }));

        fetch(&cache, &key(1), &calls).await;
        assert_eq!(cache.len(), 1);
    }
}
