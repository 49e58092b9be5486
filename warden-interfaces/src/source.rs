//! Configuration source interface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::InterfaceResult;

/// Serialization format of a configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Guess the format from a file extension, defaulting to YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Raw configuration as returned by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDocument {
    /// Human readable origin (file path, "static", ...)
    pub origin: String,
    pub format: ConfigFormat,
    pub content: String,
}

impl ConfigDocument {
    pub fn yaml(origin: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            format: ConfigFormat::Yaml,
            content: content.into(),
        }
    }

    pub fn json(origin: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            format: ConfigFormat::Json,
            content: content.into(),
        }
    }
}

/// Source of role, permission and security-rule definitions
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch the current raw configuration
    async fn fetch(&self) -> InterfaceResult<ConfigDocument>;

    /// Describe the source for logs
    fn describe(&self) -> String;

    /// Path to watch for change notifications, if the source is file backed
    fn watch_path(&self) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("warden.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("warden.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("warden")), ConfigFormat::Yaml);
    }
}
