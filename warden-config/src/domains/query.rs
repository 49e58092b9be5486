//! Secure query configuration

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};

/// Settings for secure query construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Record field holding the facility id, unless a collection overrides it
    #[serde(default = "default_facility_field")]
    pub facility_field: String,

    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            facility_field: default_facility_field(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Validatable for QueryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.facility_field, "facility_field", self.domain_name())?;
        validate_positive(self.default_page_size, "default_page_size", self.domain_name())?;
        validate_positive(self.max_page_size, "max_page_size", self.domain_name())?;

        if self.default_page_size > self.max_page_size {
            return Err(self.validation_error(format!(
                "default_page_size ({}) exceeds max_page_size ({})",
                self.default_page_size, self.max_page_size
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "query"
    }
}

fn default_facility_field() -> String {
    "facilityId".to_string()
}

fn default_page_size() -> u32 {
    50
}

fn default_max_page_size() -> u32 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_consistency() {
        assert!(QueryConfig::default().validate().is_ok());

        let inverted = QueryConfig {
            default_page_size: 100,
            max_page_size: 10,
            ..Default::default()
        };
        let err = inverted.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds max_page_size"));
    }
}
