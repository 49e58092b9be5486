//! Configuration loading and environment variable handling

use crate::domains::cache::CacheBackend;
use crate::domains::logging::{LogFormat, LogLevel};
use crate::domains::WardenConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use warden_interfaces::{ConfigDocument, ConfigFormat};

/// Configuration loader with environment variable support
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "WARDEN".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Parse configuration content, apply environment overrides and validate
    pub fn from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<WardenConfig> {
        let mut config: WardenConfig = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };

        // Apply environment variable overrides
        self.apply_env_overrides(&mut config)?;

        // Validate all domains
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from a fetched document
    pub fn from_document(&self, document: &ConfigDocument) -> ConfigResult<WardenConfig> {
        self.from_str(&document.content, document.format)
            .inspect_err(|e| log::warn!("Rejected configuration from {}: {}", document.origin, e))
    }

    /// Load configuration from a YAML or JSON file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<WardenConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        self.from_str(&content, ConfigFormat::from_path(path))
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<WardenConfig> {
        let mut config = WardenConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<WardenConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&self, config: &mut WardenConfig) -> ConfigResult<()> {
        self.apply_cache_overrides(&mut config.cache)?;
        self.apply_logging_overrides(&mut config.logging)?;
        self.apply_audit_overrides(&mut config.audit)?;
        self.apply_query_overrides(&mut config.query)?;
        Ok(())
    }

    /// Apply decision cache overrides
    fn apply_cache_overrides(
        &self,
        config: &mut crate::domains::cache::DecisionCacheConfig,
    ) -> ConfigResult<()> {
        if let Ok(enabled) = self.get_env_var("CACHE_ENABLED") {
            config.enabled = enabled
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid CACHE_ENABLED: {}", e)))?;
        }

        if let Ok(ttl) = self.get_env_var("CACHE_TTL_SECONDS") {
            let seconds: u64 = ttl
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid CACHE_TTL_SECONDS: {}", e)))?;
            config.ttl = Duration::from_secs(seconds);
        }

        if let Ok(max_entries) = self.get_env_var("CACHE_MAX_ENTRIES") {
            config.max_entries = max_entries
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid CACHE_MAX_ENTRIES: {}", e)))?;
        }

        if let Ok(backend) = self.get_env_var("CACHE_BACKEND") {
            config.backend = CacheBackend::from_str(&backend)
                .map_err(|_| ConfigError::EnvError(format!("Invalid CACHE_BACKEND: {}", backend)))?;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Apply audit config overrides
    fn apply_audit_overrides(
        &self,
        config: &mut crate::domains::audit::AuditConfig,
    ) -> ConfigResult<()> {
        if let Ok(enabled) = self.get_env_var("AUDIT_ENABLED") {
            config.enabled = enabled
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid AUDIT_ENABLED: {}", e)))?;
        }

        Ok(())
    }

    /// Apply query config overrides
    fn apply_query_overrides(
        &self,
        config: &mut crate::domains::query::QueryConfig,
    ) -> ConfigResult<()> {
        if let Ok(max_page_size) = self.get_env_var("QUERY_MAX_PAGE_SIZE") {
            config.max_page_size = max_page_size.parse().map_err(|e| {
                ConfigError::EnvError(format!("Invalid QUERY_MAX_PAGE_SIZE: {}", e))
            })?;
        }

        Ok(())
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
