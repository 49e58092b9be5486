//! Domain-specific configuration modules

pub mod audit;
pub mod cache;
pub mod logging;
pub mod query;
pub mod security;
pub mod utils;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main Warden configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WardenConfig {
    /// Roles, grants and collection security
    #[serde(default)]
    pub security: security::SecurityDefinitions,

    /// Permission decision cache
    #[serde(default)]
    pub cache: cache::DecisionCacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    /// Audit event forwarding
    #[serde(default)]
    pub audit: audit::AuditConfig,

    /// Secure query construction
    #[serde(default)]
    pub query: query::QueryConfig,
}

impl WardenConfig {
    /// Section names understood by [`WardenConfig::section`]
    pub const SECTIONS: [&'static str; 7] = [
        "security",
        "roles",
        "collections",
        "cache",
        "logging",
        "audit",
        "query",
    ];

    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.security.validate()?;
        self.cache.validate()?;
        self.logging.validate()?;
        self.audit.validate()?;
        self.query.validate()?;
        Ok(())
    }

    /// JSON view of one named section
    pub fn section(&self, name: &str) -> ConfigResult<serde_json::Value> {
        let value = match name {
            "security" => serde_json::to_value(&self.security)?,
            "roles" => serde_json::to_value(&self.security.roles)?,
            "collections" => serde_json::to_value(&self.security.collections)?,
            "cache" => serde_json::to_value(&self.cache)?,
            "logging" => serde_json::to_value(&self.logging)?,
            "audit" => serde_json::to_value(&self.audit)?,
            "query" => serde_json::to_value(&self.query)?,
            other => return Err(ConfigError::UnknownSection(other.to_string())),
        };
        Ok(value)
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = WardenConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
