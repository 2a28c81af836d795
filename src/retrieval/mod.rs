//! Retrieval core
//!
//! Turns a ranked-by-similarity result set from the vector index into a
//! deduplicated, diversity-aware, document-level result set:
//! MMR re-ranking, same-document aggregation and the orchestrating
//! `SearchService`.

mod aggregate;
mod context;
mod deduplication;
mod error;
mod mmr;
mod service;
mod subjects;

pub use aggregate::concatenate_same_document;
pub use context::format_context;
pub use deduplication::deduplicate_slices;
pub use error::{ErrorResponse, SearchError, StatusClass};
pub use mmr::{cosine_similarity, rerank};
pub use service::{MultiSearchOutcome, SearchService, SearchStatus, ServiceSettings};
pub use subjects::{blend, SubjectError, SubjectVectors};

use crate::config::SearchConfig;
use crate::index::SearchFilters;
use serde::{Deserialize, Serialize};

/// Highest SDG tag; a filter holds at most this many tags
const SDG_COUNT: u8 = 17;

const DEFAULT_NB_RESULTS: usize = 30;
const DEFAULT_INFLUENCE_FACTOR: f32 = 2.0;
const DEFAULT_RELEVANCE_FACTOR: f32 = 1.0;

fn default_nb_results() -> usize {
    DEFAULT_NB_RESULTS
}

fn default_influence_factor() -> f32 {
    DEFAULT_INFLUENCE_FACTOR
}

fn default_relevance_factor() -> f32 {
    DEFAULT_RELEVANCE_FACTOR
}

fn default_true() -> bool {
    true
}

/// Search request with optional filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query text
    pub query: String,

    /// Maximum number of results
    #[serde(default = "default_nb_results")]
    pub nb_results: usize,

    /// Optional corpus allow-list
    #[serde(default)]
    pub corpora: Option<Vec<String>>,

    /// Optional SDG tag allow-list
    #[serde(default)]
    pub sdg_filter: Option<Vec<u8>>,

    /// Optional subject whose vector is blended into the query embedding
    #[serde(default)]
    pub subject: Option<String>,

    /// Weight of the subject vector
    #[serde(default = "default_influence_factor")]
    pub influence_factor: f32,

    /// MMR trade-off: 1.0 ranks purely by similarity
    #[serde(alias = "diversity_blend", default = "default_relevance_factor")]
    pub relevance_factor: f32,

    /// Collapse slices of the same document into one result
    #[serde(default = "default_true")]
    pub concatenate: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, nb_results: usize) -> Self {
        Self {
            query: query.into(),
            nb_results,
            corpora: None,
            sdg_filter: None,
            subject: None,
            influence_factor: DEFAULT_INFLUENCE_FACTOR,
            relevance_factor: DEFAULT_RELEVANCE_FACTOR,
            concatenate: true,
        }
    }

    /// Request seeded with the configured defaults
    pub fn from_config(query: impl Into<String>, config: &SearchConfig) -> Self {
        Self {
            influence_factor: config.influence_factor,
            relevance_factor: config.relevance_factor,
            concatenate: config.concatenate,
            ..Self::new(query, config.nb_results)
        }
    }

    pub fn with_corpora(mut self, corpora: Vec<String>) -> Self {
        self.corpora = Some(corpora);
        self
    }

    pub fn with_sdg_filter(mut self, tags: Vec<u8>) -> Self {
        self.sdg_filter = Some(tags);
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_influence_factor(mut self, factor: f32) -> Self {
        self.influence_factor = factor;
        self
    }

    pub fn with_relevance_factor(mut self, factor: f32) -> Self {
        self.relevance_factor = factor;
        self
    }

    pub fn with_concatenate(mut self, concatenate: bool) -> Self {
        self.concatenate = concatenate;
        self
    }

    /// Same request for another query text
    pub fn for_query(&self, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..self.clone()
        }
    }

    /// Reject requests that cannot produce a meaningful search
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        if self.nb_results == 0 {
            return Err(SearchError::InvalidRequest(
                "nb_results must be greater than 0".to_string(),
            ));
        }

        if let Some(tags) = &self.sdg_filter {
            if tags.len() > usize::from(SDG_COUNT) {
                return Err(SearchError::InvalidRequest(format!(
                    "sdg_filter holds at most {} tags, got {}",
                    SDG_COUNT,
                    tags.len()
                )));
            }

            if let Some(tag) = tags.iter().find(|t| !(1..=SDG_COUNT).contains(*t)) {
                return Err(SearchError::InvalidRequest(format!(
                    "sdg_filter tags must be between 1 and {}, got {}",
                    SDG_COUNT, tag
                )));
            }
        }

        Ok(())
    }

    pub fn filters(&self) -> SearchFilters {
        SearchFilters::new(self.sdg_filter.clone(), self.corpora.clone())
    }
}
