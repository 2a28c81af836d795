//! Qdrant implementation of [`IndexClient`] on top of `qdrant-client`

use super::{Filter, IndexClient, IndexError, PointId, ScoredSlice, SearchMode, SlicePayload};
use crate::config::IndexConfig;
use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::with_payload_selector::SelectorOptions;
use qdrant_client::qdrant::{
    PayloadIncludeSelector, PointGroup, Query, QueryPointGroupsBuilder, QueryPointsBuilder,
    ScoredPoint, VectorsOutput, WithPayloadSelector,
};
use qdrant_client::{Qdrant, QdrantError};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

/// Payload keys fetched with every hit
const PAYLOAD_KEYS: &[&str] = &[
    "document_title",
    "document_id",
    "document_url",
    "document_lang",
    "document_corpus",
    "document_desc",
    "document_sdg",
    "slice_content",
    "slice_sdg",
    "document_scrape_date",
    "document_details.authors",
    "document_details.author",
    "document_details.publisher",
    "document_details.journal",
    "document_details.duration",
    "document_details.readability",
    "document_details.source",
];

/// Payload key used to group slices into documents
const GROUP_BY_KEY: &str = "document_id";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct QdrantClient {
    client: Qdrant,
    score_threshold: f32,
}

impl QdrantClient {
    /// Build a client from the index configuration
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        Self::with_settings(
            &config.url,
            config.api_key(),
            config.timeout(),
            config.score_threshold,
        )
    }

    pub fn with_settings(
        url: &str,
        api_key: Option<String>,
        timeout: Duration,
        score_threshold: f32,
    ) -> Result<Self, IndexError> {
        let client = Qdrant::from_url(url)
            .api_key(api_key)
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .skip_compatibility_check()
            .build()
            .map_err(transport_error)?;

        tracing::debug!("Qdrant client configured for {}", url);

        Ok(Self {
            client,
            score_threshold,
        })
    }
}

fn transport_error(e: QdrantError) -> IndexError {
    IndexError::Transport(e.to_string())
}

fn payload_options() -> SelectorOptions {
    SelectorOptions::Include(PayloadIncludeSelector {
        fields: PAYLOAD_KEYS.iter().map(|key| key.to_string()).collect(),
    })
}

fn payload_selector() -> WithPayloadSelector {
    WithPayloadSelector {
        selector_options: Some(payload_options()),
    }
}

/// First hit of each group, in group order
fn first_hits(groups: Vec<PointGroup>) -> Vec<ScoredPoint> {
    groups
        .into_iter()
        .filter_map(|group| group.hits.into_iter().next())
        .collect()
}

#[allow(deprecated)]
fn dense_vector(vectors: Option<VectorsOutput>) -> Vec<f32> {
    match vectors.and_then(|v| v.vectors_options) {
        Some(VectorsOptions::Vector(vector)) => vector.data,
        _ => Vec::new(),
    }
}

/// Convert a Qdrant hit; a payload that does not decode is dropped, the hit kept
fn to_slice(point: ScoredPoint) -> Result<ScoredSlice, IndexError> {
    let id = match point.id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Num(num)) => PointId::Num(num),
        Some(PointIdOptions::Uuid(raw)) => PointId::Uuid(
            uuid::Uuid::parse_str(&raw)
                .map_err(|e| IndexError::Decode(format!("point id {:?}: {}", raw, e)))?,
        ),
        None => return Err(IndexError::Decode("point without id".to_string())),
    };

    let payload = if point.payload.is_empty() {
        None
    } else {
        let json: Map<String, Value> = point
            .payload
            .into_iter()
            .map(|(key, value)| (key, value.into_json()))
            .collect();

        match serde_json::from_value::<SlicePayload>(Value::Object(json)) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!("Undecodable payload for point {}: {}", id, e);
                None
            }
        }
    };

    Ok(ScoredSlice {
        id,
        score: point.score,
        vector: dense_vector(point.vectors),
        payload,
    })
}

fn to_slices(points: Vec<ScoredPoint>) -> Vec<ScoredSlice> {
    points
        .into_iter()
        .filter_map(|point| match to_slice(point) {
            Ok(slice) => Some(slice),
            Err(e) => {
                tracing::warn!("Skipping index hit: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl IndexClient for QdrantClient {
    async fn list_collections(&self) -> Result<Vec<String>, IndexError> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(transport_error)?;

        let names: Vec<String> = response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect();
        tracing::info!("collections={:?}", names);

        Ok(names)
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        filter: Option<&Filter>,
        limit: usize,
        mode: SearchMode,
    ) -> Result<Vec<ScoredSlice>, IndexError> {
        let start = Instant::now();

        let points = match mode {
            SearchMode::BySlices => {
                let mut request = QueryPointsBuilder::new(collection)
                    .query(Query::new_nearest(vector.to_vec()))
                    .limit(limit as u64)
                    .score_threshold(self.score_threshold)
                    .with_payload(payload_options())
                    .with_vectors(true);
                if let Some(filter) = filter {
                    request = request.filter(filter.clone());
                }

                self.client
                    .query(request)
                    .await
                    .map_err(transport_error)?
                    .result
            }
            SearchMode::ByDocument => {
                let mut request = QueryPointGroupsBuilder::new(collection, GROUP_BY_KEY)
                    .query(Query::new_nearest(vector.to_vec()))
                    .limit(limit as u64)
                    .group_size(1u64)
                    .with_payload(payload_selector())
                    .with_vectors(true);
                if let Some(filter) = filter {
                    request = request.filter(filter.clone());
                }

                let response = self
                    .client
                    .query_groups(request)
                    .await
                    .map_err(transport_error)?;
                first_hits(response.result.map(|r| r.groups).unwrap_or_default())
            }
        };

        let hits = to_slices(points);

        tracing::info!(
            "collection={} mode={} nb_results={} latency_ms={}",
            collection,
            mode,
            hits.len(),
            start.elapsed().as_millis()
        );

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::PointId as QdrantPointId;
    use std::collections::HashMap;

    fn point(id: QdrantPointId, score: f32, payload: &[(&str, qdrant_client::qdrant::Value)]) -> ScoredPoint {
        ScoredPoint {
            id: Some(id),
            score,
            payload: payload
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect::<HashMap<_, _>>(),
            ..Default::default()
        }
    }

    #[test]
    fn test_point_conversion() {
        let hit = point(
            QdrantPointId::from(7u64),
            0.82,
            &[
                ("document_id", "doc-7".into()),
                ("slice_content", "Mangroves store carbon.".into()),
                ("slice_sdg", 14i64.into()),
            ],
        );

        let slice = to_slice(hit).unwrap();

        assert_eq!(slice.id, PointId::Num(7));
        assert_eq!(slice.score, 0.82);
        assert!(slice.vector.is_empty());
        assert_eq!(slice.document_id(), Some("doc-7"));
        assert_eq!(slice.content(), "Mangroves store carbon.");
        assert_eq!(slice.payload.unwrap().slice_sdg, Some(14));
    }

    #[test]
    fn test_uuid_ids_and_bad_points() {
        let uuid = "5c56c793-69f3-4fbf-87e6-c4bf54c28c26";
        let slice = to_slice(point(QdrantPointId::from(uuid.to_string()), 0.5, &[])).unwrap();
        assert_eq!(slice.id.to_string(), uuid);
        assert!(slice.payload.is_none());

        let malformed = point(QdrantPointId::from("not-a-uuid".to_string()), 0.4, &[]);
        assert!(matches!(to_slice(malformed), Err(IndexError::Decode(_))));

        let without_id = ScoredPoint {
            score: 0.3,
            ..Default::default()
        };
        assert!(matches!(to_slice(without_id), Err(IndexError::Decode(_))));
    }

    #[test]
    fn test_bad_hit_does_not_sink_the_others() {
        let points = vec![
            point(QdrantPointId::from(1u64), 0.9, &[("document_id", "a".into())]),
            ScoredPoint::default(),
            point(
                QdrantPointId::from(3u64),
                0.7,
                &[("slice_content", 42i64.into())],
            ),
        ];

        let slices = to_slices(points);

        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].document_id(), Some("a"));
        assert_eq!(slices[1].id, PointId::Num(3));
        assert!(slices[1].payload.is_none());
    }

    #[test]
    fn test_groups_take_first_hit() {
        let groups = vec![
            PointGroup {
                hits: vec![
                    point(QdrantPointId::from(1u64), 0.9, &[]),
                    point(QdrantPointId::from(2u64), 0.8, &[]),
                ],
                ..Default::default()
            },
            PointGroup::default(),
            PointGroup {
                hits: vec![point(QdrantPointId::from(3u64), 0.7, &[])],
                ..Default::default()
            },
        ];

        let ids: Vec<PointId> = to_slices(first_hits(groups))
            .into_iter()
            .map(|s| s.id)
            .collect();

        assert_eq!(ids, vec![PointId::Num(1), PointId::Num(3)]);
    }

    #[test]
    fn test_payload_selector_lists_keys() {
        match payload_selector().selector_options {
            Some(SelectorOptions::Include(include)) => {
                assert!(include.fields.iter().any(|f| f == "slice_content"));
                assert!(include.fields.iter().any(|f| f == GROUP_BY_KEY));
            }
            other => panic!("unexpected selector {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let client =
            QdrantClient::with_settings("http://127.0.0.1:1", None, Duration::from_secs(1), 0.5)
                .unwrap();

        let result = client.list_collections().await;
        assert!(matches!(result, Err(IndexError::Transport(_))));
    }
}
