//! Configuration sources: file backed and in-memory

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use warden_interfaces::{ConfigDocument, ConfigFormat, ConfigSource, InterfaceError, InterfaceResult};

/// Reads YAML or JSON definitions from a file, format chosen by extension
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn fetch(&self) -> InterfaceResult<ConfigDocument> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            InterfaceError::unavailable(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        Ok(ConfigDocument {
            origin: self.describe(),
            format: ConfigFormat::from_path(&self.path),
            content,
        })
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn watch_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

/// In-memory configuration whose content can be replaced at runtime
#[derive(Debug)]
pub struct StaticConfigSource {
    document: RwLock<ConfigDocument>,
}

impl StaticConfigSource {
    pub fn new(document: ConfigDocument) -> Self {
        Self {
            document: RwLock::new(document),
        }
    }

    /// YAML content
    pub fn yaml(content: impl Into<String>) -> Self {
        Self::new(ConfigDocument::yaml("static", content))
    }

    /// JSON content
    pub fn json(content: impl Into<String>) -> Self {
        Self::new(ConfigDocument::json("static", content))
    }

    /// Replace the whole document
    pub fn replace(&self, document: ConfigDocument) {
        *self.document.write() = document;
    }

    /// Replace the content, keeping origin and format
    pub fn replace_content(&self, content: impl Into<String>) {
        self.document.write().content = content.into();
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn fetch(&self) -> InterfaceResult<ConfigDocument> {
        Ok(self.document.read().clone())
    }

    fn describe(&self) -> String {
        self.document.read().origin.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_source_detects_format() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{\"audit\": {{\"enabled\": false}}}}").unwrap();

        let source = FileConfigSource::new(file.path());
        let document = source.fetch().await.unwrap();
        assert_eq!(document.format, ConfigFormat::Json);
        assert!(document.origin.starts_with("file:"));
        assert_eq!(source.watch_path().as_deref(), Some(file.path()));
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let source = FileConfigSource::new("/nonexistent/warden.yaml");
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, InterfaceError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_static_source_replace() {
        let source = StaticConfigSource::yaml("cache:\n  ttl: 10\n");
        assert_eq!(source.describe(), "static");
        assert!(source.watch_path().is_none());

        source.replace_content("cache:\n  ttl: 20\n");
        let document = source.fetch().await.unwrap();
        assert_eq!(document.content, "cache:\n  ttl: 20\n");
        assert_eq!(document.format, ConfigFormat::Yaml);
    }
}
