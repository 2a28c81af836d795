//! FastEmbed-backed embedder with a lazily populated model cache
use super::{mean_pool, split_for_model, Embedder, EmbeddingError};
use crate::cache::OnceMap;
use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Map a model name to a FastEmbed model
///
/// Accepts both the short name and the Hugging Face repository id.
pub fn resolve_model(name: &str) -> Option<EmbeddingModel> {
    let model = match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            EmbeddingModel::AllMiniLML6V2
        }
        "all-minilm-l12-v2" | "sentence-transformers/all-minilm-l12-v2" => {
            EmbeddingModel::AllMiniLML12V2
        }
        "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" | "baai/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "paraphrase-multilingual-minilm-l12-v2"
        | "sentence-transformers/paraphrase-multilingual-minilm-l12-v2" => {
            EmbeddingModel::ParaphraseMLMiniLML12V2
        }
        "multilingual-e5-small" | "intfloat/multilingual-e5-small" => {
            EmbeddingModel::MultilingualE5Small
        }
        "multilingual-e5-base" | "intfloat/multilingual-e5-base" => {
            EmbeddingModel::MultilingualE5Base
        }
        _ => return None,
    };
    Some(model)
}

/// Local embedder
///
/// Collection model ids are mapped through the configured aliases, then
/// resolved to a FastEmbed model. Each model is loaded once on tokio's
/// blocking pool and shared for the rest of the process.
pub struct FastEmbedder {
    aliases: HashMap<String, String>,
    max_words: usize,
    cache_dir: Option<PathBuf>,
    models: OnceMap<String, Arc<TextEmbedding>>,
}

impl FastEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            aliases: config.models.clone(),
            max_words: config.max_words,
            cache_dir: config.cache_dir.clone(),
            models: OnceMap::new(),
        }
    }

    fn model_name<'a>(&'a self, model_id: &'a str) -> &'a str {
        self.aliases
            .get(model_id)
            .map(String::as_str)
            .unwrap_or(model_id)
    }

    async fn model(&self, model_id: &str) -> Result<Arc<TextEmbedding>, EmbeddingError> {
        let name = self.model_name(model_id).to_string();
        let embedding_model = resolve_model(&name).ok_or_else(|| {
            tracing::error!("api_error=MODEL_NOT_FOUND model={}", model_id);
            EmbeddingError::ModelNotFound(model_id.to_string())
        })?;
        let cache_dir = self.cache_dir.clone();

        self.models
            .get_or_try_init(name.clone(), || async move {
                tokio::task::spawn_blocking(move || load_model(&name, embedding_model, cache_dir))
                    .await
                    .map_err(|e| EmbeddingError::InitializationError(e.to_string()))
                    .and_then(|loaded| loaded)
            })
            .await
    }
}

fn load_model(
    name: &str,
    embedding_model: EmbeddingModel,
    cache_dir: Option<PathBuf>,
) -> Result<Arc<TextEmbedding>, EmbeddingError> {
    let start = Instant::now();

    let mut init_options = InitOptions::new(embedding_model).with_show_download_progress(false);
    if let Some(dir) = cache_dir {
        init_options = init_options.with_cache_dir(dir);
    }

    let model = TextEmbedding::try_new(init_options)
        .map_err(|e| EmbeddingError::InitializationError(e.to_string()))?;

    tracing::info!(
        "method=get_model latency_ms={} model={}",
        start.elapsed().as_millis(),
        name
    );

    Ok(Arc::new(model))
}

#[async_trait]
impl Embedder for FastEmbedder {
    async fn embed(&self, text: &str, model_id: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let model = self.model(model_id).await?;
        let chunks = split_for_model(text, self.max_words);
        let chunk_count = chunks.len();
        let start = Instant::now();

        let embeddings = tokio::task::spawn_blocking(move || model.embed(chunks, None))
            .await
            .map_err(|e| EmbeddingError::GenerationError(e.to_string()))?
            .map_err(|e| {
                tracing::error!("api_error=EMBED_ERROR model={}", model_id);
                EmbeddingError::GenerationError(e.to_string())
            })?;

        tracing::debug!(
            "Creating embeddings time_elapsed_ms={} query_length={} chunks={} model={}",
            start.elapsed().as_millis(),
            text.len(),
            chunk_count,
            model_id
        );

        mean_pool(&embeddings)
            .ok_or_else(|| EmbeddingError::GenerationError("No embeddings generated".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_resolve_model_names() {
        assert!(matches!(
            resolve_model("intfloat/multilingual-e5-small"),
            Some(EmbeddingModel::MultilingualE5Small)
        ));
        assert!(matches!(
            resolve_model("all-MiniLM-L6-v2"),
            Some(EmbeddingModel::AllMiniLML6V2)
        ));
        assert!(resolve_model("not-a-model").is_none());
    }

    #[tokio::test]
    async fn test_unknown_model_is_model_not_found() {
        let embedder = FastEmbedder::new(&Config::default().embedding);
        let result = embedder.embed("some text", "unknown-model").await;

        assert_eq!(
            result,
            Err(EmbeddingError::ModelNotFound("unknown-model".to_string()))
        );
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected() {
        let embedder = FastEmbedder::new(&Config::default().embedding);
        let result = embedder.embed("   ", "multilingual-e5-small").await;

        assert!(matches!(result, Err(EmbeddingError::InvalidInput(_))));
    }

    #[tokio::test]
    #[ignore] // Requires model download - run with: cargo test -- --ignored
    async fn test_long_input_is_pooled() {
        let mut config = Config::default().embedding;
        config.max_words = 4;
        let embedder = FastEmbedder::new(&config);

        let short = embedder
            .embed("climate adaptation", "multilingual-e5-small")
            .await
            .unwrap();
        let long = embedder
            .embed(
                "climate adaptation in coastal cities requires long term planning and funding",
                "multilingual-e5-small",
            )
            .await
            .unwrap();

        assert_eq!(short.len(), 384);
        assert_eq!(long.len(), 384);
    }
}
