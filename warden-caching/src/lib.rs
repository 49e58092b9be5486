//! Caching abstractions and implementations for Warden
//!
//! This crate provides the [`Cache`] trait used for permission decisions, a TTL
//! store with per-entry expiry and a capacity-bounded Moka store.

pub mod cache;
pub mod errors;
pub mod stats;
pub mod stores;

use std::sync::Arc;
use std::time::Duration;

// Re-export main types
pub use cache::{Cache, CacheEntry, CacheKey, CacheValue, KeyPredicate, SharedCache};
pub use errors::{CacheError, CacheResult};
pub use stats::CacheStats;

// Re-export store implementations
#[cfg(feature = "ttl")]
pub use stores::TtlCache;

#[cfg(feature = "moka")]
pub use stores::{MokaCache, MokaCacheBuilder};

/// Create a TTL-based cache with default TTL
#[cfg(feature = "ttl")]
pub fn create_ttl_cache<K, V>(default_ttl: Duration) -> SharedCache<K, V>
where
    K: CacheKey + 'static,
    V: CacheValue + 'static,
{
    Arc::new(TtlCache::new(default_ttl))
}

/// Create a Moka-based cache bounded by capacity, with a fixed TTL
#[cfg(feature = "moka")]
pub fn create_moka_cache<K, V>(max_capacity: u64, time_to_live: Duration) -> SharedCache<K, V>
where
    K: CacheKey + 'static,
    V: CacheValue + 'static,
{
    Arc::new(
        MokaCacheBuilder::new()
            .max_capacity(max_capacity)
            .time_to_live(time_to_live)
            .build(),
    )
}
