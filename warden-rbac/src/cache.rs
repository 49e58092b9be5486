//! Permission decision cache

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use warden_caching::{create_moka_cache, create_ttl_cache, CacheStats, SharedCache};
use warden_config::{CacheBackend, DecisionCacheConfig};
use warden_interfaces::{FacilityId, Operation, ResourceId};

use crate::error::{RbacError, RbacResult};
use crate::models::PermissionDecision;

/// Cache key of a permission decision
///
/// The fingerprint covers the principal's roles, facilities and teams plus the
/// condition inputs of the context, so a changed principal never hits a stale entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionKey {
    pub principal_id: String,
    pub resource: ResourceId,
    pub operation: Operation,
    pub facility_id: Option<FacilityId>,
    pub fingerprint: u64,
}

/// Cached decision tagged with the configuration generation it was computed under
#[derive(Debug, Clone)]
pub struct CachedDecision {
    pub decision: PermissionDecision,
    pub generation: u64,
}

/// TTL-bounded decision cache shared by every check
#[derive(Clone)]
pub struct PermissionCache {
    store: Option<SharedCache<DecisionKey, CachedDecision>>,
    ttl: Duration,
    cleanup_interval: Duration,
}

impl PermissionCache {
    pub fn from_config(config: &DecisionCacheConfig) -> Self {
        let store = config.enabled.then(|| match config.backend {
            CacheBackend::Ttl => create_ttl_cache(config.ttl),
            CacheBackend::Moka => create_moka_cache(config.max_entries, config.ttl),
        });

        Self {
            store,
            ttl: config.ttl,
            cleanup_interval: config.cleanup_interval,
        }
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self {
            store: None,
            ttl: Duration::ZERO,
            cleanup_interval: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a decision computed under `generation`
    ///
    /// An entry from another generation is removed and reported as corruption.
    pub async fn lookup(
        &self,
        key: &DecisionKey,
        generation: u64,
    ) -> RbacResult<Option<PermissionDecision>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };

        match store.get(key).await? {
            Some(cached) if cached.generation == generation => Ok(Some(cached.decision)),
            Some(cached) => {
                store.remove(key).await?;
                Err(RbacError::CacheCorruption {
                    message: format!(
                        "entry for '{}' on {} from generation {} (current {})",
                        key.principal_id, key.resource, cached.generation, generation
                    ),
                })
            }
            None => Ok(None),
        }
    }

    pub async fn put(
        &self,
        key: DecisionKey,
        decision: PermissionDecision,
        generation: u64,
    ) -> RbacResult<()> {
        if let Some(store) = &self.store {
            store
                .put_with_ttl(key, CachedDecision { decision, generation }, self.ttl)
                .await?;
        }
        Ok(())
    }

    /// Drop every decision of one principal
    pub async fn invalidate_principal(&self, principal_id: &str) -> RbacResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let removed = store
            .remove_where(&|key: &DecisionKey| key.principal_id == principal_id)
            .await?;
        debug!(principal_id, removed, "Invalidated cached decisions");
        Ok(removed)
    }

    pub async fn clear(&self) -> RbacResult<()> {
        if let Some(store) = &self.store {
            store.clear().await?;
        }
        Ok(())
    }

    pub async fn stats(&self) -> RbacResult<CacheStats> {
        match &self.store {
            Some(store) => Ok(store.stats().await?),
            None => Ok(CacheStats::default()),
        }
    }

    /// Periodically purge expired entries until `shutdown` flips to true
    pub fn spawn_maintenance(&self, mut shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
        let store = self.store.clone()?;
        let period = self.cleanup_interval;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = store.purge_expired().await {
                            warn!("Decision cache cleanup failed: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!("Decision cache maintenance stopped");
                            break;
                        }
                    }
                }
            }
        }))
    }
}
