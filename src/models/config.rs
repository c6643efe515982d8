use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::schema::{RecordSchema, TextField};
use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:8080";
pub const DEFAULT_SOURCE: &str = "corpus";
pub const APP_DIR: &str = "nutri-rag";

/// Environment variable overriding `embedding.url`.
pub const EMBEDDING_URL_ENV: &str = "NUTRAG_EMBEDDING_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
    }

    /// Load from `path` if given (it must exist), else from the default location.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            None => match Self::config_path() {
                Some(path) if path.exists() => {
                    let content = std::fs::read_to_string(&path)?;
                    toml::from_str(&content)?
                }
                _ => Self::default(),
            },
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(EMBEDDING_URL_ENV)
            && !url.trim().is_empty()
        {
            self.embedding.url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }
        if self.embedding.timeout_secs == 0 || self.search.embed_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeouts must be at least 1 second".to_string(),
            ));
        }
        if self.search.default_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "search.default_top_k must be at least 1".to_string(),
            ));
        }
        if self.ingest.fields.is_empty() {
            return Err(ConfigError::ValidationError(
                "ingest.fields must name at least one column".to_string(),
            ));
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Repeats of a failed batch after the first call while ingesting.
    /// Queries are never retried.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_batch_size() -> u32 {
    32
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl IndexConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join(APP_DIR).join("index.sqlite3"))
    }

    /// Configured index path, or the platform data directory.
    pub fn resolved_path(&self) -> Result<PathBuf, ConfigError> {
        self.path.clone().or_else(Self::default_path).ok_or_else(|| {
            ConfigError::PathError("could not determine data directory".to_string())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Label identifying the corpus; record ids derive from it
    #[serde(default = "default_source")]
    pub source: String,

    #[serde(default = "default_fields")]
    pub fields: Vec<TextField>,
}

fn default_source() -> String {
    DEFAULT_SOURCE.to_string()
}

fn default_fields() -> Vec<TextField> {
    RecordSchema::nutrition().fields
}

impl IngestConfig {
    pub fn schema(&self) -> RecordSchema {
        RecordSchema::new(self.fields.clone())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            fields: default_fields(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default = "default_embed_timeout")]
    pub embed_timeout_secs: u64,

    #[serde(default)]
    pub default_format: OutputFormat,

    #[serde(default)]
    pub default_min_score: Option<f32>,
}

fn default_top_k() -> usize {
    3
}

fn default_embed_timeout() -> u64 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            embed_timeout_secs: default_embed_timeout(),
            default_format: OutputFormat::Text,
            default_min_score: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.url, DEFAULT_EMBEDDING_URL);
        assert_eq!(config.search.default_top_k, 3);
        assert_eq!(config.ingest.source, DEFAULT_SOURCE);
        assert_eq!(config.ingest.schema(), RecordSchema::nutrition());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [search]
            default_top_k = 5

            [ingest]
            source = "indian_food"
            "#,
        )
        .unwrap();
        assert_eq!(config.search.default_top_k, 5);
        assert_eq!(config.search.embed_timeout_secs, 10);
        assert_eq!(config.ingest.source, "indian_food");
        assert_eq!(config.ingest.fields.len(), 6);
        assert_eq!(config.embedding.batch_size, 32);
    }

    #[test]
    fn test_validation_rejects_zero_top_k() {
        let mut config = Config::default();
        config.search.default_top_k = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.index.path = Some(dir.path().join("index.sqlite3"));
        config.embedding.batch_size = 4;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.embedding.batch_size, 4);
        assert_eq!(loaded.index.path, config.index.path);
        assert_eq!(loaded.ingest.fields, config.ingest.fields);
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
