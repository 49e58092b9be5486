//! Error types for RBAC operations

use thiserror::Error;
use warden_caching::CacheError;
use warden_config::ConfigError;
use warden_interfaces::InterfaceError;

/// Result type for RBAC operations
pub type RbacResult<T> = Result<T, RbacError>;

/// RBAC-specific errors
///
/// Ordinary denials are [`crate::PermissionDecision`] values, not errors. These
/// variants cover structural failures and operations that cannot proceed.
#[derive(Error, Debug)]
pub enum RbacError {
    /// Configuration failed to parse or validate
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// No usable configuration snapshot
    #[error("Configuration unavailable: {message}")]
    ConfigurationUnavailable { message: String },

    /// Malformed principal or resource context
    #[error("Invalid context: {message}")]
    InvalidContext { message: String },

    /// Role not present in the loaded hierarchy
    #[error("Unknown role: {role}")]
    UnknownRole { role: String },

    /// Resource with no security configuration
    #[error("Unknown resource: {resource}")]
    UnknownResource { resource: String },

    /// Access to a facility the principal does not belong to
    #[error("Facility mismatch: {message}")]
    FacilityMismatch { message: String },

    /// Permission denied
    #[error("Permission denied: {action} on {resource} ({reason})")]
    PermissionDenied {
        action: String,
        resource: String,
        reason: String,
    },

    /// A cached decision did not belong to the current configuration
    #[error("Cache corruption: {message}")]
    CacheCorruption { message: String },

    /// Cache backend failure
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Collaborator failure
    #[error("Collaborator error: {0}")]
    Interface(#[from] InterfaceError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration file watcher failure
    #[error("Watcher error: {0}")]
    WatcherError(String),

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RbacError {
    /// Create a new permission denied error
    pub fn permission_denied(
        action: impl Into<String>,
        resource: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::PermissionDenied {
            action: action.into(),
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ConfigurationUnavailable {
            message: message.into(),
        }
    }

    pub fn invalid_context(message: impl Into<String>) -> Self {
        Self::InvalidContext {
            message: message.into(),
        }
    }

    pub fn facility_mismatch(message: impl Into<String>) -> Self {
        Self::FacilityMismatch {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a permission denied error
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// Check if the error stems from missing or invalid configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::ConfigurationUnavailable { .. }
        )
    }

    pub fn is_facility_mismatch(&self) -> bool {
        matches!(self, Self::FacilityMismatch { .. })
    }

    pub fn is_invalid_context(&self) -> bool {
        matches!(self, Self::InvalidContext { .. })
    }

    /// Check if this is a rule lookup miss
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::UnknownRole { .. } | Self::UnknownResource { .. })
    }
}
