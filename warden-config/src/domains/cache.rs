//! Decision cache configuration

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

/// Cache store implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Map with per-entry expiry and periodic cleanup
    #[default]
    Ttl,
    /// Moka concurrent cache with capacity bound
    Moka,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ttl" => Ok(CacheBackend::Ttl),
            "moka" => Ok(CacheBackend::Moka),
            _ => Err(format!("Invalid cache backend: {}", s)),
        }
    }
}

/// Permission decision cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionCacheConfig {
    /// Whether decisions are cached at all
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: CacheBackend,

    /// Time-to-live of a cached decision
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_ttl")]
    pub ttl: Duration,

    /// Capacity bound (Moka backend)
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,

    /// Interval of the background purge of expired entries
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_cleanup_interval")]
    pub cleanup_interval: Duration,
}

impl Default for DecisionCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::default(),
            ttl: default_ttl(),
            max_entries: default_max_entries(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

impl Validatable for DecisionCacheConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.ttl.as_secs(), "ttl", self.domain_name())?;
        validate_positive(self.max_entries, "max_entries", self.domain_name())?;
        validate_positive(self.cleanup_interval.as_secs(), "cleanup_interval", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "cache"
    }
}

fn default_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_max_entries() -> u64 {
    10_000
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60)
}
