//! Audit configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::validation::Validatable;

/// Controls which permission decisions are forwarded to the audit sink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    /// Record allowed decisions as well as denials
    #[serde(default = "crate::domains::utils::default_true")]
    pub include_allowed: bool,

    /// Record decisions served from the cache
    #[serde(default = "crate::domains::utils::default_false")]
    pub include_cached: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_allowed: true,
            include_cached: false,
        }
    }
}

impl AuditConfig {
    /// Whether a decision with the given outcome should be recorded
    pub fn should_record(&self, allowed: bool, cached: bool) -> bool {
        self.enabled && (self.include_allowed || !allowed) && (self.include_cached || !cached)
    }
}

impl Validatable for AuditConfig {
    fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "audit"
    }
}
