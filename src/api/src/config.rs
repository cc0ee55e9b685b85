//! Configuration for the PMU ingestion tool.

use serde::{Deserialize, Serialize};

use crate::service::DEFAULT_PAGE_SIZE;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding the raw scraped documents
    #[serde(default = "default_documents_path")]
    pub documents_path: String,
    /// SQLite file holding the normalized races
    #[serde(default = "default_relational_path")]
    pub relational_path: String,
    /// Races read per page when streaming every race
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_documents_path() -> String {
    "data/pmu/documents.db".to_string()
}

fn default_relational_path() -> String {
    "data/pmu/races.db".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            documents_path: default_documents_path(),
            relational_path: default_relational_path(),
            page_size: default_page_size(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (PMU_STORAGE__RELATIONAL_PATH, etc.)
            .add_source(
                config::Environment::with_prefix("PMU")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.relational_path, "data/pmu/races.db");
        assert_eq!(config.storage.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"storage": {"documents_path": "/tmp/docs.db"}}"#).unwrap();
        assert_eq!(config.storage.documents_path, "/tmp/docs.db");
        assert_eq!(config.storage.relational_path, "data/pmu/races.db");
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
