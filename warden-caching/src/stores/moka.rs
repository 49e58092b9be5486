//! Moka-based high-performance cache implementation

use async_trait::async_trait;
use moka::future::Cache as MokaInner;
use std::time::Duration;

use crate::{
    cache::{Cache, CacheKey, CacheValue, KeyPredicate},
    stats::{create_stats_collector, SharedStatsCollector},
    CacheResult, CacheStats,
};

/// Moka-based cache wrapper
///
/// TTL is fixed when the cache is built; `put_with_ttl` uses it too.
pub struct MokaCache<K, V> {
    /// Inner Moka cache
    inner: MokaInner<K, V>,

    /// Statistics collector
    stats: SharedStatsCollector,
}

impl<K, V> MokaCache<K, V>
where
    K: CacheKey + 'static,
    V: CacheValue + 'static,
{
    /// Create a new Moka cache with max capacity
    pub fn new(max_capacity: u64) -> Self {
        MokaCacheBuilder::new().max_capacity(max_capacity).build()
    }
}

#[async_trait]
impl<K, V> Cache<K, V> for MokaCache<K, V>
where
    K: CacheKey + 'static,
    V: CacheValue + 'static,
{
    async fn get(&self, key: &K) -> CacheResult<Option<V>> {
        let result = self.inner.get(key).await;

        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }

        Ok(result)
    }

    async fn put(&self, key: K, value: V) -> CacheResult<()> {
        self.inner.insert(key, value).await;
        self.stats.record_put();
        Ok(())
    }

    async fn put_with_ttl(&self, key: K, value: V, _ttl: Duration) -> CacheResult<()> {
        self.put(key, value).await
    }

    async fn remove(&self, key: &K) -> CacheResult<Option<V>> {
        let result = self.inner.remove(key).await;

        if result.is_some() {
            self.stats.record_invalidations(1);
        }

        Ok(result)
    }

    async fn remove_where(&self, predicate: KeyPredicate<'_, K>) -> CacheResult<usize> {
        let matching: Vec<_> = self
            .inner
            .iter()
            .filter(|(key, _)| predicate(&**key))
            .map(|(key, _)| key)
            .collect();

        for key in &matching {
            self.inner.invalidate(&**key).await;
        }

        self.stats.record_invalidations(matching.len());
        Ok(matching.len())
    }

    async fn clear(&self) -> CacheResult<()> {
        let count = self.inner.entry_count() as usize;
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;

        self.stats.record_invalidations(count);
        Ok(())
    }

    async fn purge_expired(&self) -> CacheResult<usize> {
        // Moka expires entries itself; this only flushes its pending maintenance
        self.inner.run_pending_tasks().await;
        Ok(0)
    }

    async fn len(&self) -> CacheResult<usize> {
        self.inner.run_pending_tasks().await;
        Ok(self.inner.entry_count() as usize)
    }

    async fn stats(&self) -> CacheResult<CacheStats> {
        let len = self.len().await?;
        Ok(self.stats.get_stats(len))
    }
}

/// Builder for Moka cache
#[derive(Debug, Default)]
pub struct MokaCacheBuilder {
    max_capacity: Option<u64>,
    time_to_live: Option<Duration>,
}

impl MokaCacheBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max capacity
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Set time to live
    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Build the cache
    pub fn build<K, V>(self) -> MokaCache<K, V>
    where
        K: CacheKey + 'static,
        V: CacheValue + 'static,
    {
        let mut builder = MokaInner::builder();

        if let Some(capacity) = self.max_capacity {
            builder = builder.max_capacity(capacity);
        }

        if let Some(ttl) = self.time_to_live {
            builder = builder.time_to_live(ttl);
        }

        MokaCache {
            inner: builder.build(),
            stats: create_stats_collector(),
        }
    }
}
