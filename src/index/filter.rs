//! Translation of request filters into Qdrant filter conditions

pub use qdrant_client::qdrant::Filter;
use qdrant_client::qdrant::Condition;

/// Payload key holding the slice SDG tag
pub const SLICE_SDG_KEY: &str = "slice_sdg";
/// Payload key holding the document corpus name
pub const CORPUS_KEY: &str = "document_corpus";

/// Allow-lists requested by the caller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub slice_sdg: Option<Vec<u8>>,
    pub document_corpus: Option<Vec<String>>,
}

impl SearchFilters {
    pub fn new(slice_sdg: Option<Vec<u8>>, document_corpus: Option<Vec<String>>) -> Self {
        Self {
            slice_sdg,
            document_corpus,
        }
    }

    /// Build the index filter; `None` when nothing restricts the search
    ///
    /// Every non-empty allow-list becomes one `must` condition matching any
    /// of its values.
    pub fn build(&self) -> Option<Filter> {
        let mut must = Vec::new();

        if let Some(tags) = self.slice_sdg.as_ref().filter(|t| !t.is_empty()) {
            let tags: Vec<i64> = tags.iter().map(|t| i64::from(*t)).collect();
            must.push(Condition::matches(SLICE_SDG_KEY, tags));
        }

        if let Some(corpora) = self.document_corpus.as_ref().filter(|c| !c.is_empty()) {
            must.push(Condition::matches(CORPUS_KEY, corpora.clone()));
        }

        if must.is_empty() {
            None
        } else {
            tracing::debug!("build_filters conditions={}", must.len());
            Some(Filter::must(must))
        }
    }
}
