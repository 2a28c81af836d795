//! Configuration management for welearn-search
//!
//! Loads the TOML configuration, applies `WELEARN_SECTION__KEY` environment
//! overrides and validates the result before anything else is constructed.

use crate::error::{Result, WelearnError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Prefix of environment variables that override configuration values
const ENV_PREFIX: &str = "WELEARN_";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub subjects: SubjectsConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Vector index (Qdrant) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// gRPC endpoint, port 6334 by default
    pub url: String,
    /// Name of the environment variable holding the API key, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
    pub collection_prefix: String,
    /// Similarity floor applied to by-slice queries
    pub score_threshold: f32,
}

impl IndexConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Maps the model id embedded in collection names to a fastembed model name
    #[serde(default)]
    pub models: HashMap<String, String>,
    /// Maximum number of words embedded in one pass before chunking
    pub max_words: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

/// Request defaults and orchestration limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub nb_results: usize,
    pub influence_factor: f32,
    pub relevance_factor: f32,
    pub concatenate: bool,
    pub supported_languages: Vec<String>,
    pub max_concurrent_queries: usize,
}

/// Subject vector source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WelearnError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| WelearnError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| WelearnError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: WELEARN_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply overrides from an arbitrary set of `(name, value)` pairs
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "INDEX__URL" => {
                self.index.url = value.to_string();
            }
            "INDEX__API_KEY_ENV" => {
                self.index.api_key_env = Some(value.to_string());
            }
            "INDEX__TIMEOUT_SECS" => {
                self.index.timeout_secs = parse_value(path, value)?;
            }
            "INDEX__COLLECTION_PREFIX" => {
                self.index.collection_prefix = value.to_string();
            }
            "INDEX__SCORE_THRESHOLD" => {
                self.index.score_threshold = parse_value(path, value)?;
            }
            "EMBEDDING__MAX_WORDS" => {
                self.embedding.max_words = parse_value(path, value)?;
            }
            "EMBEDDING__CACHE_DIR" => {
                self.embedding.cache_dir = Some(PathBuf::from(value));
            }
            "SEARCH__NB_RESULTS" => {
                self.search.nb_results = parse_value(path, value)?;
            }
            "SEARCH__INFLUENCE_FACTOR" => {
                self.search.influence_factor = parse_value(path, value)?;
            }
            "SEARCH__RELEVANCE_FACTOR" => {
                self.search.relevance_factor = parse_value(path, value)?;
            }
            "SEARCH__CONCATENATE" => {
                self.search.concatenate = parse_value(path, value)?;
            }
            "SEARCH__SUPPORTED_LANGUAGES" => {
                self.search.supported_languages = value
                    .split(',')
                    .map(|lang| lang.trim().to_lowercase())
                    .filter(|lang| !lang.is_empty())
                    .collect();
            }
            "SEARCH__MAX_CONCURRENT_QUERIES" => {
                self.search.max_concurrent_queries = parse_value(path, value)?;
            }
            "SUBJECTS__VECTORS_FILE" => {
                self.subjects.vectors_file = Some(PathBuf::from(value));
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| WelearnError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("welearn-search").join("config.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| WelearnError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "multilingual-e5-small".to_string(),
            "multilingual-e5-small".to_string(),
        );

        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            index: IndexConfig {
                url: "http://localhost:6334".to_string(),
                api_key_env: Some("QDRANT_API_KEY".to_string()),
                timeout_secs: 100,
                collection_prefix: "collection_welearn_".to_string(),
                score_threshold: 0.5,
            },
            embedding: EmbeddingConfig {
                models,
                max_words: 256,
                cache_dir: None,
            },
            search: SearchConfig {
                nb_results: 30,
                influence_factor: 2.0,
                relevance_factor: 1.0,
                concatenate: true,
                supported_languages: vec!["en".to_string(), "fr".to_string()],
                max_concurrent_queries: 4,
            },
            subjects: SubjectsConfig::default(),
        }
    }
}
