//! Vector index collaborator
//!
//! The search core only talks to the index through [`IndexClient`]; the
//! Qdrant implementation, built on `qdrant-client`, lives in [`qdrant`].

mod filter;
pub mod qdrant;

pub use filter::{Filter, SearchFilters, CORPUS_KEY, SLICE_SDG_KEY};
pub use qdrant::QdrantClient;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index transport failed: {0}")]
    Transport(String),

    #[error("Index query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode index response: {0}")]
    Decode(String),
}

/// Point identifier as stored by the index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(uuid::Uuid),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(id) => write!(f, "{}", id),
            PointId::Uuid(id) => write!(f, "{}", id),
        }
    }
}

/// Payload attached to every slice in the index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlicePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_corpus: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_lang: Option<String>,

    /// SDG tags of the whole document
    #[serde(
        default,
        deserialize_with = "sdg_tags",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub document_sdg: Vec<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_desc: Option<String>,

    /// Free-form document metadata (authors, publisher, readability, ...)
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Map::is_empty"
    )]
    pub document_details: Map<String, Value>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub slice_content: String,

    /// Topic tag of this slice
    #[serde(
        default,
        deserialize_with = "sdg_tag",
        skip_serializing_if = "Option::is_none"
    )]
    pub slice_sdg: Option<u8>,

    /// Keys not modelled above, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A slice returned by the index together with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSlice {
    pub id: PointId,

    pub score: f32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub vector: Vec<f32>,

    #[serde(default)]
    pub payload: Option<SlicePayload>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tag list stored as a list, a single number or null; non-tag entries are skipped
fn sdg_tags<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.iter().filter_map(as_sdg).collect(),
        Some(value) => as_sdg(&value).into_iter().collect(),
        None => Vec::new(),
    })
}

/// Single tag; a list yields its first valid entry
fn sdg_tag<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.iter().find_map(as_sdg),
        Some(value) => as_sdg(&value),
        None => None,
    })
}

/// Integral number in `u8` range, including float encodings such as `4.0`
fn as_sdg(value: &Value) -> Option<u8> {
    let n = value.as_f64()?;
    if n.fract() == 0.0 && (0.0..=f64::from(u8::MAX)).contains(&n) {
        Some(n as u8)
    } else {
        None
    }
}

impl ScoredSlice {
    /// Non-empty document id, if the slice carries one
    pub fn document_id(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|p| p.document_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn content(&self) -> &str {
        self.payload
            .as_ref()
            .map(|p| p.slice_content.as_str())
            .unwrap_or("")
    }
}

/// A collection scoped to one language/embedding-model pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub lang: String,
    pub model: String,
}

impl Collection {
    /// Parse `<prefix><lang>_<model>`; names outside that scheme yield `None`
    pub fn from_name(name: &str, prefix: &str) -> Option<Self> {
        let rest = name.strip_prefix(prefix)?;
        let (lang, model) = rest.split_once('_')?;

        if lang.is_empty() || model.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            lang: lang.to_string(),
            model: model.to_string(),
        })
    }
}

/// Retrieval granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Raw slices above the similarity floor
    BySlices,
    /// At most one slice per document, grouped by the index
    ByDocument,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::BySlices => write!(f, "by_slices"),
            SearchMode::ByDocument => write!(f, "by_document"),
        }
    }
}

/// Client for the vector index
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Names of every collection in the index
    async fn list_collections(&self) -> Result<Vec<String>, IndexError>;

    /// Nearest slices to `vector`, sorted by descending score
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        filter: Option<&Filter>,
        limit: usize,
        mode: SearchMode,
    ) -> Result<Vec<ScoredSlice>, IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_from_name() {
        let collection =
            Collection::from_name("collection_welearn_fr_multilingual-e5-small", "collection_welearn_")
                .unwrap();

        assert_eq!(collection.lang, "fr");
        assert_eq!(collection.model, "multilingual-e5-small");
        assert!(Collection::from_name("wiki_fr_exists", "collection_welearn_").is_none());
        assert!(Collection::from_name("collection_welearn_fr", "collection_welearn_").is_none());
    }

    #[test]
    fn test_scored_slice_decoding() {
        let raw = serde_json::json!({
            "id": "5c56c793-69f3-4fbf-87e6-c4bf54c28c26",
            "version": 3,
            "score": 0.71,
            "vector": null,
            "payload": {
                "document_id": "d1",
                "slice_content": "text",
                "slice_sdg": 4,
                "document_details": {"authors": ["A"]},
                "document_scrape_date": "2024-01-01"
            }
        });

        let slice: ScoredSlice = serde_json::from_value(raw).unwrap();
        assert!(matches!(slice.id, PointId::Uuid(_)));
        assert!(slice.vector.is_empty());

        let payload = slice.payload.as_ref().unwrap();
        assert_eq!(payload.slice_sdg, Some(4));
        assert!(payload.extra.contains_key("document_scrape_date"));
        assert_eq!(slice.document_id(), Some("d1"));
    }

    #[test]
    fn test_irregular_sdg_payloads_decode() {
        let payload: SlicePayload = serde_json::from_value(serde_json::json!({
            "document_id": "d2",
            "document_sdg": null,
            "slice_sdg": [7, 9],
            "slice_content": null,
            "document_details": null
        }))
        .unwrap();

        assert!(payload.document_sdg.is_empty());
        assert_eq!(payload.slice_sdg, Some(7));
        assert_eq!(payload.slice_content, "");
        assert!(payload.document_details.is_empty());

        let payload: SlicePayload = serde_json::from_value(serde_json::json!({
            "document_sdg": [3.0, "x", 15],
            "slice_sdg": 12.0
        }))
        .unwrap();

        assert_eq!(payload.document_sdg, vec![3, 15]);
        assert_eq!(payload.slice_sdg, Some(12));

        let payload: SlicePayload =
            serde_json::from_value(serde_json::json!({ "document_sdg": 5, "slice_sdg": "n/a" }))
                .unwrap();

        assert_eq!(payload.document_sdg, vec![5]);
        assert_eq!(payload.slice_sdg, None);
    }

    #[test]
    fn test_empty_document_id_is_none() {
        let slice = ScoredSlice {
            id: PointId::Num(1),
            score: 0.5,
            vector: vec![],
            payload: Some(SlicePayload {
                document_id: Some(String::new()),
                ..Default::default()
            }),
        };

        assert_eq!(slice.document_id(), None);
        assert_eq!(slice.content(), "");
    }
}
