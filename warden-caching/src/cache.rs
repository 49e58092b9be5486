//! Core cache traits and types

use async_trait::async_trait;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{CacheResult, CacheStats};

/// Trait for types that can be used as cache keys
pub trait CacheKey: Clone + Eq + Hash + Debug + Send + Sync {}

/// Trait for types that can be cached
pub trait CacheValue: Clone + Debug + Send + Sync {}

// Blanket implementations
impl<T> CacheKey for T where T: Clone + Eq + Hash + Debug + Send + Sync {}
impl<T> CacheValue for T where T: Clone + Debug + Send + Sync {}

/// Predicate used for bulk invalidation
pub type KeyPredicate<'a, K> = &'a (dyn Fn(&K) -> bool + Send + Sync);

/// Shared, type-erased cache handle
pub type SharedCache<K, V> = Arc<dyn Cache<K, V>>;

/// Core cache trait
///
/// Implementations are internally synchronized; callers never lock around them.
#[async_trait]
pub trait Cache<K: CacheKey + 'static, V: CacheValue + 'static>: Send + Sync {
    /// Get a value from the cache
    async fn get(&self, key: &K) -> CacheResult<Option<V>>;

    /// Put a value into the cache
    async fn put(&self, key: K, value: V) -> CacheResult<()>;

    /// Put a value with TTL
    async fn put_with_ttl(&self, key: K, value: V, _ttl: Duration) -> CacheResult<()> {
        // Default implementation ignores TTL
        self.put(key, value).await
    }

    /// Remove a value from the cache
    async fn remove(&self, key: &K) -> CacheResult<Option<V>>;

    /// Remove every entry whose key matches, returning how many were removed
    async fn remove_where(&self, predicate: KeyPredicate<'_, K>) -> CacheResult<usize>;

    /// Check if a key exists
    async fn contains_key(&self, key: &K) -> CacheResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Clear all entries
    async fn clear(&self) -> CacheResult<()>;

    /// Drop expired entries eagerly
    async fn purge_expired(&self) -> CacheResult<usize> {
        Ok(0)
    }

    /// Get the number of live entries
    async fn len(&self) -> CacheResult<usize>;

    /// Check if cache is empty
    async fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Get cache statistics
    async fn stats(&self) -> CacheResult<CacheStats>;
}

/// Cache entry with metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// When the entry was created
    pub created_at: Instant,

    /// When the entry expires (if applicable)
    pub expires_at: Option<Instant>,

    /// Number of times accessed
    pub access_count: u64,
}

impl<V: CacheValue> CacheEntry<V> {
    /// Create a new cache entry
    pub fn new(value: V) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            expires_at: None,
            access_count: 0,
        }
    }

    /// Create a new cache entry with TTL
    pub fn with_ttl(value: V, ttl: Duration) -> Self {
        let mut entry = Self::new(value);
        entry.expires_at = Some(entry.created_at + ttl);
        entry
    }

    /// Check if the entry is expired at `now`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Check if the entry is expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Record an access
    pub fn record_access(&mut self) {
        self.access_count += 1;
    }
}
