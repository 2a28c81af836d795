//! Subject vectors used to steer a query embedding toward a topic

use crate::embedding::EmbeddingError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubjectError {
    #[error("Failed to read subject vectors from {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid subject vectors file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Subject name to vector, keyed case-insensitively
#[derive(Debug, Clone, Default)]
pub struct SubjectVectors {
    vectors: HashMap<String, Vec<f32>>,
}

impl SubjectVectors {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_map(vectors: HashMap<String, Vec<f32>>) -> Self {
        Self {
            vectors: vectors
                .into_iter()
                .map(|(subject, vector)| (subject.to_lowercase(), vector))
                .collect(),
        }
    }

    /// Load a JSON object mapping subject names to vectors
    pub fn load(path: &Path) -> Result<Self, SubjectError> {
        let content = std::fs::read_to_string(path).map_err(|source| SubjectError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let vectors: HashMap<String, Vec<f32>> =
            serde_json::from_str(&content).map_err(|source| SubjectError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!("Loaded {} subject vectors from {:?}", vectors.len(), path);

        Ok(Self::from_map(vectors))
    }

    pub fn get(&self, subject: &str) -> Option<&[f32]> {
        self.vectors
            .get(&subject.to_lowercase())
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// `embedding += influence_factor * subject`, without re-normalising
pub fn blend(
    embedding: &mut [f32],
    subject: &[f32],
    influence_factor: f32,
) -> Result<(), EmbeddingError> {
    if embedding.len() != subject.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: embedding.len(),
            actual: subject.len(),
        });
    }

    for (value, direction) in embedding.iter_mut().zip(subject) {
        *value += influence_factor * direction;
    }

    Ok(())
}
