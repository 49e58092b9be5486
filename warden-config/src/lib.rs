//! Domain-driven configuration management for Warden
//!
//! This crate provides modular configuration split by functional domains
//! (security definitions, decision cache, logging, audit, query), with
//! validation, defaults, environment variable overrides and pluggable sources.

pub mod error;
pub mod loader;
pub mod sources;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use sources::{FileConfigSource, StaticConfigSource};

// Re-export domain configurations
pub use domains::{
    audit::AuditConfig,
    cache::{CacheBackend, DecisionCacheConfig},
    logging::{LogFormat, LogLevel, LoggingConfig},
    query::QueryConfig,
    security::{
        CollectionDefinition, FieldRuleDefinition, GrantDefinition, OperationSet, RoleDefinition,
        SecurityDefinitions,
    },
    WardenConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
