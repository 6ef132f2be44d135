//! Expiring Cache Module
//!
//! TTL semantics and a compute-on-miss path on top of a durable store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, de::IgnoredAny, Serialize};
use tracing::{debug, info, warn};

use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheEntry, CacheStats, Clock, SingleFlight, SystemClock, MAX_KEY_LENGTH};
use crate::error::{CacheError, GetOrComputeError, Result, StoreError};
use crate::store::DurableStore;

// == Expiring Cache ==
/// Façade that adds expiry to a durable store.
///
/// Entries are judged on read against the injected clock and removed lazily.
/// The cache itself keeps only counters and, when enabled, the in-flight
/// registry.
pub struct ExpiringCache {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    flights: Option<SingleFlight>,
    stats: StatsRecorder,
}

/// Outcome of reading and decoding one key.
enum Lookup<T> {
    Absent,
    Expired,
    Live(CacheEntry<T>),
}

impl ExpiringCache {
    // == Constructor ==
    /// Creates a cache over `store` using the system clock.
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Creates a cache over `store` judging expiry with `clock`.
    pub fn with_clock(store: Arc<dyn DurableStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            flights: None,
            stats: StatsRecorder::default(),
        }
    }

    /// Collapses concurrent misses on one key into a single compute.
    pub fn with_single_flight(mut self) -> Self {
        self.flights = Some(SingleFlight::new());
        self
    }

    pub fn single_flight_enabled(&self) -> bool {
        self.flights.is_some()
    }

    // == Set ==
    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    ///
    /// A zero TTL is accepted and produces an entry that is already expired.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        self.validate_key(key)?;

        let (bytes, expires_at) = {
            let entry = CacheEntry::new(value, self.clock.now_ms(), ttl);
            let bytes = entry.encode().map_err(StoreError::Serialization)?;
            (bytes, entry.expires_at)
        };
        self.store.set(key, bytes).await?;

        debug!("Cache set: key={} expires_at={}", key, expires_at);
        Ok(())
    }

    // == Get ==
    /// Returns the live value for `key`, or `None` if absent or expired.
    ///
    /// Expired entries are deleted on a best-effort basis. Bytes that do not
    /// decode surface as `CorruptEntry` rather than `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.lookup(key).await? {
            Lookup::Live(entry) => {
                self.stats.record_hit();
                debug!("Cache hit: key={}", key);
                Ok(Some(entry.value))
            }
            Lookup::Expired => {
                self.stats.record_expired();
                Ok(None)
            }
            Lookup::Absent => {
                self.stats.record_miss();
                debug!("Cache miss: key={}", key);
                Ok(None)
            }
        }
    }

    // == Get Or Compute ==
    /// Returns the live value for `key`, computing and caching it on a miss.
    ///
    /// A failed `compute` leaves the cache untouched and is returned as
    /// `GetOrComputeError::Compute`. A failed cache write after a successful
    /// compute is logged and counted, and the computed value is still returned.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> std::result::Result<T, GetOrComputeError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let _flight = match &self.flights {
            Some(flights) => {
                let guard = flights.acquire(key).await;
                // Another caller may have filled the key while we waited.
                // The miss is already counted, so this read stays off the stats.
                if let Lookup::Live(entry) = self.lookup(key).await? {
                    return Ok(entry.value);
                }
                Some(guard)
            }
            None => None,
        };

        self.stats.record_compute();
        let value = compute().await.map_err(GetOrComputeError::Compute)?;

        if let Err(err) = self.set(key, &value, ttl).await {
            self.stats.record_write_failure();
            warn!("Cache write after compute failed for key {}: {}", key, err);
        }

        Ok(value)
    }

    // == Delete ==
    /// Removes `key`. Removing an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.validate_key(key)?;
        self.store.delete(key).await?;
        debug!("Cache delete: key={}", key);
        Ok(())
    }

    // == Time To Live ==
    /// Remaining lifetime of the live entry under `key`.
    pub async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = self.clock.now_ms();
        match self.lookup::<IgnoredAny>(key).await? {
            Lookup::Live(entry) => Ok(Some(entry.ttl_remaining(now))),
            Lookup::Expired | Lookup::Absent => Ok(None),
        }
    }

    // == Sweep Expired ==
    /// Removes every expired entry the store lists, best-effort.
    ///
    /// Corrupt or foreign entries are left in place. Returns how many entries
    /// were removed.
    ///
    /// The store has no compare-and-delete, so a `set` that lands between the
    /// expiry check and the delete of the same key loses its fresh value. The
    /// lazy delete on read has the same window. Callers see a miss, never a
    /// stale value.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let keys = self.store.keys().await?;
        let now = self.clock.now_ms();
        let mut removed = 0;

        for key in keys {
            let Some(bytes) = self.store.get(&key).await? else {
                continue;
            };
            let entry = match CacheEntry::<IgnoredAny>::decode(&bytes) {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Sweep skipping undecodable key {}: {}", key, err);
                    continue;
                }
            };
            if !entry.is_expired(now) {
                continue;
            }

            match self.store.delete(&key).await {
                Ok(()) => removed += 1,
                Err(err) => warn!("Sweep failed to delete expired key {}: {}", key, err),
            }
        }

        self.stats.record_swept(removed);
        if removed > 0 {
            info!("Expiry sweep removed {} entries", removed);
        }
        Ok(removed)
    }

    // == Stats ==
    /// Returns a snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Checks `key` against the cache limit and the store's own limit.
    fn validate_key(&self, key: &str) -> Result<()> {
        let max_len = self
            .store
            .max_key_length()
            .map_or(MAX_KEY_LENGTH, |store_max| store_max.min(MAX_KEY_LENGTH));
        check_key(key, max_len)
    }

    /// Reads and classifies `key`, lazily deleting it when expired.
    async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Result<Lookup<T>> {
        self.validate_key(key)?;

        let Some(bytes) = self.store.get(key).await? else {
            return Ok(Lookup::Absent);
        };

        let entry = match CacheEntry::<T>::decode(&bytes) {
            Ok(entry) => entry,
            Err(source) => {
                self.stats.record_corrupt();
                return Err(CacheError::CorruptEntry {
                    key: key.to_string(),
                    source,
                });
            }
        };

        if entry.is_expired(self.clock.now_ms()) {
            // Not atomic with the read; see `sweep_expired`.
            if let Err(err) = self.store.delete(key).await {
                warn!("Failed to remove expired key {}: {}", key, err);
            }
            debug!("Cache expired: key={}", key);
            return Ok(Lookup::Expired);
        }

        Ok(Lookup::Live(entry))
    }
}

impl std::fmt::Debug for ExpiringCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("single_flight", &self.flights.is_some())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

/// Rejects empty keys and keys longer than `max_len` bytes.
fn check_key(key: &str, max_len: usize) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > max_len {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            max_len
        )));
    }
    Ok(())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Session {
        user_id: u64,
    }

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>, ExpiringCache) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = ExpiringCache::with_clock(store.clone(), clock.clone());
        (store, clock, cache)
    }

    /// Store whose writes always fail; reads and deletes behave.
    #[derive(Default)]
    struct ReadOnlyStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl DurableStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(key).await
        }
        async fn set(&self, _key: &str, _value: Vec<u8>) -> std::result::Result<(), StoreError> {
            Err(StoreError::WriteDenied("read-only".to_string()))
        }
        async fn delete(&self, _key: &str) -> std::result::Result<(), StoreError> {
            Err(StoreError::WriteDenied("read-only".to_string()))
        }
        async fn keys(&self) -> std::result::Result<Vec<String>, StoreError> {
            self.inner.keys().await
        }
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (_store, _clock, cache) = setup();

        let session = Session { user_id: 42 };
        cache.set("session:42", &session, Duration::from_secs(1)).await.unwrap();

        let value: Option<Session> = cache.get("session:42").await.unwrap();
        assert_eq!(value, Some(session));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (_store, _clock, cache) = setup();

        let value: Option<String> = cache.get("nonexistent").await.unwrap();
        assert!(value.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_expiry_removes_entry_lazily() {
        let (store, clock, cache) = setup();

        cache.set("k", &"v", Duration::from_millis(1_000)).await.unwrap();
        clock.advance(Duration::from_millis(999));
        assert_eq!(cache.get::<String>("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(Duration::from_millis(1));
        // Still physically present until read
        assert!(store.get("k").await.unwrap().is_some());

        assert_eq!(cache.get::<String>("k").await.unwrap(), None);
        assert!(store.get("k").await.unwrap().is_none());

        let stats = cache.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_immediately_expired() {
        let (_store, _clock, cache) = setup();

        cache.set("k", &1u8, Duration::ZERO).await.unwrap();
        assert_eq!(cache.get::<u8>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sub_millisecond_ttl_is_live() {
        let (_store, clock, cache) = setup();

        cache.set("k", &7u32, Duration::from_micros(500)).await.unwrap();
        assert_eq!(cache.get::<u32>("k").await.unwrap(), Some(7));

        cache.set("n", &8u32, Duration::from_nanos(1)).await.unwrap();
        assert_eq!(cache.get::<u32>("n").await.unwrap(), Some(8));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get::<u32>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_expiry() {
        let (_store, clock, cache) = setup();

        cache.set("k", &"v1", Duration::from_secs(10)).await.unwrap();
        cache.set("k", &"v2", Duration::from_secs(1)).await.unwrap();
        assert_eq!(cache.get::<String>("k").await.unwrap().as_deref(), Some("v2"));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.get::<String>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_not_absent() {
        let (store, _clock, cache) = setup();

        store.set("k", b"{not json".to_vec()).await.unwrap();

        let result = cache.get::<String>("k").await;
        assert!(matches!(result, Err(CacheError::CorruptEntry { .. })));
        assert_eq!(cache.stats().corrupt, 1);
        // Corrupt bytes are left for the caller to deal with
        assert!(store.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_corrupt() {
        let (_store, _clock, cache) = setup();

        cache.set("k", &"text", Duration::from_secs(5)).await.unwrap();
        let result = cache.get::<Session>("k").await;
        assert!(matches!(result, Err(CacheError::CorruptEntry { .. })));
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let (_store, _clock, cache) = setup();

        let result = cache.set("", &1, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));

        let long_key = "x".repeat(MAX_KEY_LENGTH + 1);
        let result = cache.get::<i32>(&long_key).await;
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_store_write_failure_surfaces() {
        let cache = ExpiringCache::new(Arc::new(MemoryStore::with_max_entries(1)));

        cache.set("a", &1, Duration::from_secs(60)).await.unwrap();
        let result = cache.set("b", &2, Duration::from_secs(60)).await;
        assert!(matches!(
            result,
            Err(CacheError::Store(StoreError::QuotaExceeded(_)))
        ));
    }

    #[tokio::test]
    async fn test_expired_cleanup_failure_is_not_an_error() {
        let store = Arc::new(ReadOnlyStore::default());
        let clock = Arc::new(ManualClock::new(0));
        let entry = CacheEntry::new("old", 0, Duration::from_millis(10));
        store.inner.set("k", entry.encode().unwrap()).await.unwrap();

        let cache = ExpiringCache::with_clock(store.clone(), clock.clone());
        clock.advance(Duration::from_millis(20));

        assert_eq!(cache.get::<String>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let (_store, _clock, cache) = setup();

        cache.set("k", &"v", Duration::from_secs(5)).await.unwrap();
        cache.delete("k").await.unwrap();
        cache.delete("k").await.unwrap();

        assert_eq!(cache.get::<String>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_remaining() {
        let (_store, clock, cache) = setup();

        cache.set("k", &"v", Duration::from_secs(10)).await.unwrap();
        clock.advance(Duration::from_secs(4));

        assert_eq!(cache.ttl("k").await.unwrap(), Some(Duration::from_secs(6)));
        assert_eq!(cache.ttl("missing").await.unwrap(), None);

        clock.advance(Duration::from_secs(6));
        assert_eq!(cache.ttl("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_or_compute_miss_then_hit() {
        let (_store, _clock, cache) = setup();
        let calls = AtomicUsize::new(0);

        let first: std::result::Result<u32, GetOrComputeError<String>> = cache
            .get_or_compute("answer", Duration::from_secs(5), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await;
        assert_eq!(first.unwrap(), 42);

        let second: std::result::Result<u32, GetOrComputeError<String>> = cache
            .get_or_compute("answer", Duration::from_secs(5), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;
        assert_eq!(second.unwrap(), 42);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get::<u32>("answer").await.unwrap(), Some(42));
        assert_eq!(cache.stats().computes, 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_failure_leaves_cache_untouched() {
        let (store, _clock, cache) = setup();

        let result = cache
            .get_or_compute::<u32, _, _, _>("k", Duration::from_secs(5), || async {
                Err("backend down")
            })
            .await;

        assert_eq!(result.unwrap_err().into_compute(), Some("backend down"));
        assert!(store.is_empty().await);
        assert_eq!(cache.get::<u32>("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_or_compute_returns_value_when_write_fails() {
        let cache = ExpiringCache::new(Arc::new(ReadOnlyStore::default()));

        let result: std::result::Result<String, GetOrComputeError<()>> = cache
            .get_or_compute("k", Duration::from_secs(5), || async { Ok("fresh".to_string()) })
            .await;

        assert_eq!(result.unwrap(), "fresh");
        assert_eq!(cache.stats().write_failures, 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_propagates_corruption() {
        let (store, _clock, cache) = setup();
        store.set("k", b"garbage".to_vec()).await.unwrap();

        let result = cache
            .get_or_compute::<u32, (), _, _>("k", Duration::from_secs(5), || async { Ok(1) })
            .await;

        assert!(matches!(
            result,
            Err(GetOrComputeError::Cache(CacheError::CorruptEntry { .. }))
        ));
        assert_eq!(cache.stats().computes, 0);
    }

    #[tokio::test]
    async fn test_single_flight_collapses_concurrent_misses() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(ExpiringCache::new(store).with_single_flight());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute::<u64, (), _, _>("slow", Duration::from_secs(60), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(99)
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 99);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_flight_counts_one_miss() {
        let cache = ExpiringCache::new(Arc::new(MemoryStore::new())).with_single_flight();

        let value = cache
            .get_or_compute::<u32, (), _, _>("k", Duration::from_secs(5), || async { Ok(3) })
            .await
            .unwrap();
        assert_eq!(value, 3);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.computes, 1);
    }

    #[tokio::test]
    async fn test_single_flight_waiters_count_one_miss_each() {
        let cache = Arc::new(ExpiringCache::new(Arc::new(MemoryStore::new())).with_single_flight());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute::<u32, (), _, _>("k", Duration::from_secs(60), || async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(5)
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 5);
        }

        let stats = cache.stats();
        assert_eq!(stats.computes, 1);
        assert_eq!(stats.hits + stats.misses, 4);
    }

    #[tokio::test]
    async fn test_store_key_limit_enforced() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(crate::store::FileStore::open(dir.path()).await.unwrap());
        let cache = ExpiringCache::new(store);

        let long_key = "k".repeat(121);
        let result = cache.set(&long_key, &1, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(CacheError::InvalidKey(_))));
        assert!(matches!(
            cache.get::<i32>(&long_key).await,
            Err(CacheError::InvalidKey(_))
        ));

        let fits = "k".repeat(120);
        cache.set(&fits, &1, Duration::from_secs(5)).await.unwrap();
        assert_eq!(cache.get::<i32>(&fits).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let (store, clock, cache) = setup();

        cache.set("short", &1, Duration::from_secs(1)).await.unwrap();
        cache.set("long", &2, Duration::from_secs(60)).await.unwrap();
        store.set("foreign", b"not an entry".to_vec()).await.unwrap();

        clock.advance(Duration::from_secs(2));
        let removed = cache.sweep_expired().await.unwrap();

        assert_eq!(removed, 1);
        assert!(store.get("short").await.unwrap().is_none());
        assert!(store.get("long").await.unwrap().is_some());
        assert!(store.get("foreign").await.unwrap().is_some());
        assert_eq!(cache.stats().swept, 1);
    }
}
