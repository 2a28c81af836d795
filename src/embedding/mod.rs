//! Query embedding
//!
//! - `Embedder` trait so the search core never depends on a model backend
//! - `FastEmbedder` for local inference, models loaded lazily once per process
//! - Whitespace chunking and mean pooling for inputs longer than a model accepts

mod chunking;
mod provider;

pub use chunking::{mean_pool, split_for_model};
pub use provider::{resolve_model, FastEmbedder};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Maps text to a dense vector with the named model
///
/// Implementations must be deterministic for identical `(text, model_id)`.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, model_id: &str) -> Result<Vec<f32>, EmbeddingError>;
}
