//! Time-bounded key/value cache
//!
//! Entries live for a fixed TTL from the moment their value was produced and
//! are evicted lazily when a lookup finds them expired. There is no background
//! sweeper.
//!
//! A single async mutex covers lookup, expiry check and factory execution, so
//! each key sees at most one factory evaluation per TTL window even under
//! concurrent callers. The price is that a slow factory stalls every other
//! operation on the same cache, including ones for unrelated keys: keep
//! factories short, or pair [`TtlCache::try_get`] with [`TtlCache::insert`]
//! and produce the value outside the lock.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    /// `None` when `created + ttl` does not fit in an `Instant`
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Thread-safe cache whose entries expire after a per-insert TTL
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the live value for `key`, or run `factory` and store its result
    /// for `ttl`.
    ///
    /// Concurrent callers for the same key wait for the first one and receive
    /// its value instead of running their own factory.
    pub async fn get_or_add<F, Fut>(&self, key: K, factory: F, ttl: Duration) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let mut entries = self.entries.lock().await;

        if let Some(value) = Self::lookup(&mut entries, &key) {
            return value;
        }

        let value = factory().await;
        entries.insert(key, Self::entry(value.clone(), ttl));
        value
    }

    /// Like [`get_or_add`](Self::get_or_add) for factories that can fail.
    ///
    /// A failed factory stores nothing; the error goes to this caller only and
    /// the next caller for the key runs its own factory.
    pub async fn get_or_try_add<F, Fut, E>(&self, key: K, factory: F, ttl: Duration) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let mut entries = self.entries.lock().await;

        if let Some(value) = Self::lookup(&mut entries, &key) {
            return Ok(value);
        }

        let value = factory().await?;
        entries.insert(key, Self::entry(value.clone(), ttl));
        Ok(value)
    }

    /// Live value for `key`, if any. Drops the entry when it has expired.
    pub async fn try_get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().await;
        Self::lookup(&mut entries, key)
    }

    /// Store `value` for `ttl`, replacing any entry for `key`.
    ///
    /// Holds the lock only for the map update, so callers can produce the
    /// value outside it.
    pub async fn insert(&self, key: K, value: V, ttl: Duration) {
        self.entries
            .lock()
            .await
            .insert(key, Self::entry(value, ttl));
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    fn lookup(entries: &mut HashMap<K, Entry<V>>, key: &K) -> Option<V> {
        let entry = entries.get(key)?;
        if entry.is_live(Instant::now()) {
            return Some(entry.value.clone());
        }

        entries.remove(key);
        None
    }

    fn entry(value: V, ttl: Duration) -> Entry<V> {
        Entry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TTL: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_get_or_add_within_ttl_runs_factory_once() {
        let cache: TtlCache<&str, usize> = TtlCache::new();
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_add("k", || async { calls.fetch_add(1, Ordering::SeqCst) + 1 }, TTL)
            .await;
        tokio::time::advance(Duration::from_millis(50)).await;
        let second = cache
            .get_or_add("k", || async { calls.fetch_add(1, Ordering::SeqCst) + 1 }, TTL)
            .await;

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_add_after_expiry_recreates() {
        let cache: TtlCache<&str, usize> = TtlCache::new();
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_add("k", || async { calls.fetch_add(1, Ordering::SeqCst) + 1 }, TTL)
            .await;
        tokio::time::advance(Duration::from_millis(150)).await;
        let second = cache
            .get_or_add("k", || async { calls.fetch_add(1, Ordering::SeqCst) + 1 }, TTL)
            .await;

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_factory_run() {
        let cache: Arc<TtlCache<String, usize>> = Arc::new(TtlCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_add(
                            "unseen".to_string(),
                            || async move {
                                tokio::time::sleep(Duration::from_millis(10)).await;
                                calls.fetch_add(1, Ordering::SeqCst) + 100
                            },
                            Duration::from_secs(60),
                        )
                        .await
                })
            })
            .collect();

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| *v == 100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_get_never_creates_and_evicts_expired() {
        let cache: TtlCache<&str, &str> = TtlCache::new();
        assert_eq!(cache.try_get(&"k").await, None);
        assert!(cache.is_empty().await);

        cache.get_or_add("k", || async { "v" }, TTL).await;
        assert_eq!(cache.try_get(&"k").await, Some("v"));
        assert_eq!(cache.len().await, 1);

        tokio::time::advance(Duration::from_millis(150)).await;
        // Expired but still stored until looked up
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.try_get(&"k").await, None);
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_failed_factory_is_not_stored() {
        let cache: TtlCache<&str, usize> = TtlCache::new();

        let failed: Result<usize, String> = cache
            .get_or_try_add("k", || async { Err("boom".to_string()) }, TTL)
            .await;
        assert_eq!(failed, Err("boom".to_string()));
        assert_eq!(cache.try_get(&"k").await, None);

        let retried: Result<usize, String> = cache
            .get_or_try_add("k", || async { Ok(7) }, Duration::from_secs(60))
            .await;
        assert_eq!(retried, Ok(7));
        assert_eq!(cache.try_get(&"k").await, Some(7));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cache: TtlCache<&str, &str> = TtlCache::new();
        let ttl = Duration::from_secs(60);

        assert_eq!(cache.get_or_add("a", || async { "first" }, ttl).await, "first");
        assert_eq!(cache.get_or_add("b", || async { "second" }, ttl).await, "second");
        assert_eq!(cache.get_or_add("a", || async { "other" }, ttl).await, "first");
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        let cache: TtlCache<&str, u8> = TtlCache::new();
        cache.get_or_add("k", || async { 1 }, Duration::MAX).await;
        assert_eq!(cache.try_get(&"k").await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_replaces_and_expires() {
        let cache: TtlCache<&str, u8> = TtlCache::new();

        cache.insert("k", 1, TTL).await;
        cache.insert("k", 2, TTL).await;
        assert_eq!(cache.try_get(&"k").await, Some(2));
        assert_eq!(cache.get_or_add("k", || async { 9 }, TTL).await, 2);

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(cache.try_get(&"k").await, None);
    }
}
