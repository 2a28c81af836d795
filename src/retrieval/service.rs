//! Search orchestration: validate, resolve collection, embed, query, rerank,
//! aggregate

use super::{
    blend, concatenate_same_document, deduplicate_slices, rerank, SearchError, SearchRequest,
    SubjectVectors,
};
use crate::cache::OnceMap;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::index::{Collection, Filter, IndexClient, IndexError, ScoredSlice, SearchMode};
use crate::language::LanguageDetector;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Orchestration settings derived from the configuration
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub collection_prefix: String,
    pub supported_languages: Vec<String>,
    /// Upper bound on a single index call
    pub index_timeout: Duration,
    /// Sub-searches run at once by `search_multi_inputs`
    pub max_concurrent_queries: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection_prefix: config.index.collection_prefix.clone(),
            supported_languages: config.search.supported_languages.clone(),
            index_timeout: config.index.timeout(),
            max_concurrent_queries: config.search.max_concurrent_queries,
        }
    }
}

/// Whether every sub-search of a fan-out answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchStatus {
    Complete,
    Partial { completed: usize, total: usize },
}

/// Merged result of a multi-input search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiSearchOutcome {
    pub results: Vec<ScoredSlice>,
    #[serde(flatten)]
    pub status: SearchStatus,
}

impl MultiSearchOutcome {
    /// Partial outcomes surface as a `PARTIAL_RESULT` warning
    pub fn warning(&self) -> Option<SearchError> {
        match self.status {
            SearchStatus::Complete => None,
            SearchStatus::Partial { completed, total } => {
                Some(SearchError::PartialResult { completed, total })
            }
        }
    }
}

/// Collection lookup failures, split by how the caller must react
enum LookupError {
    NotFound,
    Unavailable(IndexError),
}

/// Search orchestrator
///
/// Collaborators are injected once at start-up and shared by every request.
/// The only state kept across requests is the language to collection cache.
pub struct SearchService {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn IndexClient>,
    detector: Arc<dyn LanguageDetector>,
    subjects: Arc<SubjectVectors>,
    settings: ServiceSettings,
    collections: OnceMap<String, Collection>,
}

impl SearchService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn IndexClient>,
        detector: Arc<dyn LanguageDetector>,
        subjects: Arc<SubjectVectors>,
        settings: ServiceSettings,
    ) -> Self {
        tracing::debug!("SearchService=init");

        Self {
            embedder,
            index,
            detector,
            subjects,
            settings,
            collections: OnceMap::new(),
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Forget cached language to collection mappings
    pub fn invalidate_collections(&self) {
        self.collections.clear();
    }

    /// Collections in the index that follow the naming scheme
    pub async fn list_collections(&self) -> Result<Vec<Collection>, IndexError> {
        let names = tokio::time::timeout(self.settings.index_timeout, self.index.list_collections())
            .await
            .map_err(|_| IndexError::Timeout(self.settings.index_timeout))??;

        Ok(names
            .iter()
            .filter_map(|name| Collection::from_name(name, &self.settings.collection_prefix))
            .collect())
    }

    /// Run one search in the given mode
    ///
    /// Validation and resolution failures are returned as errors. A failing or
    /// slow index yields an empty list.
    pub async fn search_handler(
        &self,
        request: &SearchRequest,
        mode: SearchMode,
    ) -> Result<Vec<ScoredSlice>, SearchError> {
        request.validate()?;

        let lang = self.detect_language(&request.query)?;

        let subject_vector = match &request.subject {
            Some(subject) => Some(self.subjects.get(subject).ok_or_else(|| {
                tracing::error!("Subject vector not found, subject={}", subject);
                SearchError::SubjectNotFound {
                    subject: subject.clone(),
                }
            })?),
            None => None,
        };

        let collection = match self.collection_by_language(&lang).await {
            Ok(collection) => collection,
            Err(LookupError::NotFound) => return Err(SearchError::CollectionNotFound { lang }),
            Err(LookupError::Unavailable(e)) => {
                tracing::warn!("Index unavailable while listing collections: {}", e);
                return Ok(Vec::new());
            }
        };

        let mut embedding = self
            .embedder
            .embed(&request.query, &collection.model)
            .await?;

        if let Some(subject_vector) = subject_vector {
            blend(&mut embedding, subject_vector, request.influence_factor)?;
            tracing::debug!(
                "Adding subject vector influence_factor={}",
                request.influence_factor
            );
        }

        let filter = request.filters().build();
        let hits = self
            .query_index(
                &collection,
                &embedding,
                filter.as_ref(),
                request.nb_results,
                mode,
            )
            .await;

        let mut results = rerank(hits, request.relevance_factor);

        if request.concatenate {
            results = concatenate_same_document(results);
        }

        Ok(results)
    }

    /// Search several query texts concurrently and merge the results
    ///
    /// Each text runs as a by-slices search without aggregation. Results are
    /// joined in input order, deduplicated by slice id, sorted by score and
    /// re-ranked as one set; aggregation then follows `request.concatenate`.
    /// When only some sub-searches succeed the outcome is `Partial`; when none
    /// do, the first error is returned.
    pub async fn search_multi_inputs(
        &self,
        request: &SearchRequest,
        queries: &[String],
    ) -> Result<MultiSearchOutcome, SearchError> {
        if queries.is_empty() || queries.iter().any(|q| q.trim().is_empty()) {
            return Err(SearchError::EmptyQuery);
        }

        let limit = self.settings.max_concurrent_queries.max(1);
        let sub_requests: Vec<SearchRequest> = queries
            .iter()
            .map(|query| request.for_query(query.as_str()).with_concatenate(false))
            .collect();

        let answers: Vec<Result<Vec<ScoredSlice>, SearchError>> = stream::iter(
            sub_requests
                .iter()
                .map(|sub| self.search_handler(sub, SearchMode::BySlices)),
        )
        .buffered(limit)
        .collect()
        .await;

        let total = answers.len();
        let mut completed = 0;
        let mut first_error = None;
        let mut merged = Vec::new();

        for (query, answer) in queries.iter().zip(answers) {
            match answer {
                Ok(hits) => {
                    completed += 1;
                    merged.extend(hits);
                }
                Err(e) => {
                    tracing::warn!("Sub-search failed query={:?} code={}", query, e.code());
                    first_error.get_or_insert(e);
                }
            }
        }

        if completed == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let mut merged = deduplicate_slices(merged);
        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut results = rerank(merged, request.relevance_factor);
        if request.concatenate {
            results = concatenate_same_document(results);
        }

        let status = if completed == total {
            SearchStatus::Complete
        } else {
            tracing::warn!("Partial response result: {}/{} queries", completed, total);
            SearchStatus::Partial { completed, total }
        };

        Ok(MultiSearchOutcome { results, status })
    }

    fn detect_language(&self, query: &str) -> Result<String, SearchError> {
        let lang = self.detector.detect(query).map_err(|e| {
            tracing::error!("api_error=LANG_NOT_DETECTED error={}", e);
            SearchError::from(e)
        })?;

        if !self.settings.supported_languages.iter().any(|l| *l == lang) {
            return Err(SearchError::language_not_supported(&lang));
        }

        Ok(lang)
    }

    async fn collection_by_language(&self, lang: &str) -> Result<Collection, LookupError> {
        self.collections
            .get_or_try_init(lang.to_string(), || async {
                let collections = match self.list_collections().await {
                    Ok(collections) => collections,
                    Err(e) => return Err(LookupError::Unavailable(e)),
                };

                let collection = collections.into_iter().find(|c| c.lang == lang);
                if let Some(collection) = &collection {
                    tracing::info!("lang={} collection={}", lang, collection.name);
                }
                collection.ok_or(LookupError::NotFound)
            })
            .await
    }

    async fn query_index(
        &self,
        collection: &Collection,
        embedding: &[f32],
        filter: Option<&Filter>,
        limit: usize,
        mode: SearchMode,
    ) -> Vec<ScoredSlice> {
        let start = Instant::now();
        let query = self
            .index
            .query(&collection.name, embedding, filter, limit, mode);

        match tokio::time::timeout(self.settings.index_timeout, query).await {
            Ok(Ok(hits)) => {
                tracing::debug!(
                    "method=query_index collection={} mode={} nb_results={} latency_ms={}",
                    collection.name,
                    mode,
                    hits.len(),
                    start.elapsed().as_millis()
                );
                hits
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    "Index query failed, returning no results collection={}: {}",
                    collection.name,
                    e
                );
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    "Index query timed out after {:?} collection={}",
                    self.settings.index_timeout,
                    collection.name
                );
                Vec::new()
            }
        }
    }
}
