use crate::config::Config;
use crate::error::{Result, ValidationError, WelearnError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every failure
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_search(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WelearnError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        let url = &config.index.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "index.url",
                format!("URL must start with http:// or https://, got '{}'", url),
            ));
        }

        if config.index.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "index.timeout_secs",
                "Timeout must be greater than 0",
            ));
        }

        if config.index.collection_prefix.is_empty() {
            errors.push(ValidationError::new(
                "index.collection_prefix",
                "Collection prefix cannot be empty",
            ));
        }

        let threshold = config.index.score_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            errors.push(ValidationError::new(
                "index.score_threshold",
                format!("Score threshold must be between -1.0 and 1.0, got {}", threshold),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.max_words == 0 {
            errors.push(ValidationError::new(
                "embedding.max_words",
                "Chunk size must be greater than 0",
            ));
        }

        for (alias, model) in &config.embedding.models {
            if model.is_empty() {
                errors.push(ValidationError::new(
                    format!("embedding.models.{}", alias),
                    "Model name cannot be empty",
                ));
            }
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        let search = &config.search;

        if search.nb_results == 0 {
            errors.push(ValidationError::new(
                "search.nb_results",
                "Default result count must be greater than 0",
            ));
        }

        if search.max_concurrent_queries == 0 {
            errors.push(ValidationError::new(
                "search.max_concurrent_queries",
                "Concurrency limit must be greater than 0",
            ));
        }

        if search.supported_languages.is_empty() {
            errors.push(ValidationError::new(
                "search.supported_languages",
                "At least one language must be supported",
            ));
        }

        for lang in &search.supported_languages {
            if lang.len() != 2 || !lang.chars().all(|c| c.is_ascii_lowercase()) {
                errors.push(ValidationError::new(
                    "search.supported_languages",
                    format!("Expected a lowercase ISO-639-1 code, got '{}'", lang),
                ));
            }
        }

        if !search.relevance_factor.is_finite() || !search.influence_factor.is_finite() {
            errors.push(ValidationError::new(
                "search",
                "Relevance and influence factors must be finite",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.index.url = "localhost:6334".to_string();
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = Config::default();
        config.index.timeout_secs = 0;
        config.search.supported_languages = vec!["ENG".to_string()];

        match ConfigValidator::validate(&config) {
            Err(WelearnError::ConfigValidation { errors }) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }
}
