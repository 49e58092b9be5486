//! Time-based TTL cache implementation

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::{
    cache::{Cache, CacheEntry, CacheKey, CacheValue, KeyPredicate},
    stats::{create_stats_collector, SharedStatsCollector},
    CacheResult, CacheStats,
};

/// TTL-based cache implementation
///
/// Expired entries are never returned: `get` drops them on access and
/// `purge_expired` sweeps the rest.
pub struct TtlCache<K, V> {
    /// Default TTL for entries
    default_ttl: Duration,

    /// Store with entries
    store: RwLock<HashMap<K, CacheEntry<V>>>,

    /// Statistics collector
    stats: SharedStatsCollector,
}

impl<K: CacheKey + 'static, V: CacheValue + 'static> TtlCache<K, V> {
    /// Create a new TTL cache with default TTL
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_capacity(default_ttl, 0)
    }

    /// Create with capacity hint
    pub fn with_capacity(default_ttl: Duration, capacity: usize) -> Self {
        Self {
            default_ttl,
            store: RwLock::new(HashMap::with_capacity(capacity)),
            stats: create_stats_collector(),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

#[async_trait]
impl<K: CacheKey + 'static, V: CacheValue + 'static> Cache<K, V> for TtlCache<K, V> {
    async fn get(&self, key: &K) -> CacheResult<Option<V>> {
        let mut store = self.store.write();
        let result = match store.get_mut(key) {
            Some(entry) if entry.is_expired() => {
                store.remove(key);
                self.stats.record_evictions(1);
                self.stats.record_miss();
                None
            }
            Some(entry) => {
                entry.record_access();
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        };

        Ok(result)
    }

    async fn put(&self, key: K, value: V) -> CacheResult<()> {
        self.put_with_ttl(key, value, self.default_ttl).await
    }

    async fn put_with_ttl(&self, key: K, value: V, ttl: Duration) -> CacheResult<()> {
        self.store.write().insert(key, CacheEntry::with_ttl(value, ttl));
        self.stats.record_put();
        Ok(())
    }

    async fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        let removed = self.store.write().remove(key);
        match removed {
            Some(entry) if entry.is_expired() => {
                self.stats.record_evictions(1);
                Ok(None)
            }
            Some(entry) => {
                self.stats.record_invalidations(1);
                Ok(Some(entry.value))
            }
            None => Ok(None),
        }
    }

    async fn remove_where(&self, predicate: KeyPredicate<'_, K>) -> CacheResult<usize> {
        let mut store = self.store.write();
        let before = store.len();
        store.retain(|key, _| !predicate(key));
        let removed = before - store.len();

        self.stats.record_invalidations(removed);
        Ok(removed)
    }

    async fn clear(&self) -> CacheResult<()> {
        let mut store = self.store.write();
        let count = store.len();
        store.clear();

        self.stats.record_invalidations(count);
        Ok(())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        let now = Instant::now();
        let mut store = self.store.write();
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired_at(now));
        let purged = before - store.len();

        if purged > 0 {
            log::debug!("Purged {} expired cache entries", purged);
        }
        self.stats.record_evictions(purged);
        Ok(purged)
    }

    async fn len(&self) -> CacheResult<usize> {
        let now = Instant::now();
        let count = self
            .store
            .read()
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .count();
        Ok(count)
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let len = self.len().await?;
        Ok(self.stats.get_stats(len))
    }
}
