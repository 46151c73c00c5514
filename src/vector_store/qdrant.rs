//! Qdrant-backed vector store
//!
//! Each partition is a Qdrant collection. Chunk payloads carry `chunk_id`,
//! `content` and free-form metadata (`doc_type`, `document_id`,
//! `page_number`, `document_date`, ...).

use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{
        condition::ConditionOneOf, r#match::MatchValue, with_payload_selector::SelectorOptions,
        Condition, FieldCondition, Filter, Match, SearchPoints, Value as QdrantValue,
        WithPayloadSelector,
    },
};
use serde_json::{Map, Value as JsonValue};

use crate::config::QdrantSettings;
use crate::errors::{RagError, Result};
use crate::vector_store::{SearchFilter, VectorHit, VectorStore};

/// Vector store over a Qdrant instance
pub struct QdrantStore {
    client: QdrantClient,
}

impl QdrantStore {
    /// Connect to Qdrant (the connection is lazy; nothing is sent yet)
    pub fn new(settings: &QdrantSettings) -> Result<Self> {
        let client = QdrantClient::from_url(&settings.url)
            .build()
            .map_err(|e| RagError::VectorStore(format!("Failed to create Qdrant client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn partition_exists(&self, name: &str) -> Result<bool> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to list collections: {}", e)))?;

        Ok(collections.collections.iter().any(|c| c.name == name))
    }

    async fn search(
        &self,
        partition: &str,
        vector: &[f32],
        filter: Option<&SearchFilter>,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<VectorHit>> {
        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: partition.to_string(),
                vector: vector.to_vec(),
                limit: limit as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                score_threshold: Some(score_threshold),
                filter: filter.filter(|f| !f.is_empty()).map(to_qdrant_filter),
                ..Default::default()
            })
            .await
            .map_err(|e| RagError::Retrieval {
                partition: partition.to_string(),
                message: e.to_string(),
            })?;

        let hits = search_result
            .result
            .into_iter()
            .map(|point| {
                let payload: Map<String, JsonValue> = point
                    .payload
                    .iter()
                    .filter_map(|(key, value)| qdrant_to_json_value(value).map(|v| (key.clone(), v)))
                    .collect();

                VectorHit {
                    id: point_id_to_string(&point.id),
                    score: point.score,
                    payload,
                }
            })
            .collect();

        Ok(hits)
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to list collections: {}", e)))?;

        Ok(collections.collections.into_iter().map(|c| c.name).collect())
    }
}

fn to_qdrant_filter(filter: &SearchFilter) -> Filter {
    Filter {
        must: filter
            .must_match
            .iter()
            .map(|(key, value)| Condition {
                condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                    key: key.clone(),
                    r#match: Some(Match {
                        match_value: Some(MatchValue::Keyword(value.clone())),
                    }),
                    ..Default::default()
                })),
            })
            .collect(),
        ..Default::default()
    }
}

fn qdrant_to_json_value(value: &QdrantValue) -> Option<JsonValue> {
    use qdrant_client::qdrant::value::Kind;

    value.kind.as_ref().and_then(|kind| match kind {
        Kind::StringValue(s) => Some(JsonValue::String(s.clone())),
        Kind::IntegerValue(i) => Some(JsonValue::Number((*i).into())),
        Kind::DoubleValue(f) => serde_json::Number::from_f64(*f).map(JsonValue::Number),
        Kind::BoolValue(b) => Some(JsonValue::Bool(*b)),
        Kind::ListValue(list) => Some(JsonValue::Array(
            list.values.iter().filter_map(qdrant_to_json_value).collect(),
        )),
        _ => None,
    })
}

fn point_id_to_string(point_id: &Option<qdrant_client::qdrant::PointId>) -> String {
    use qdrant_client::qdrant::point_id::PointIdOptions;

    point_id
        .as_ref()
        .and_then(|id| match &id.point_id_options {
            Some(PointIdOptions::Num(n)) => Some(n.to_string()),
            Some(PointIdOptions::Uuid(u)) => Some(u.clone()),
            None => None,
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::value::Kind;
    use qdrant_client::qdrant::ListValue;

    #[test]
    fn test_filter_conversion() {
        let filter = to_qdrant_filter(&SearchFilter::doc_type("factsheet"));
        assert_eq!(filter.must.len(), 1);
    }

    #[test]
    fn test_value_conversion() {
        let value = QdrantValue {
            kind: Some(Kind::ListValue(ListValue {
                values: vec![QdrantValue::from("equity".to_string()), QdrantValue::from(3_i64)],
            })),
        };
        let json = qdrant_to_json_value(&value).unwrap();
        assert_eq!(json, serde_json::json!(["equity", 3]));
        assert_eq!(point_id_to_string(&None), "unknown");
    }

    #[tokio::test]
    #[ignore] // Integration test - requires Qdrant
    async fn test_partition_exists_against_server() {
        let store = QdrantStore::new(&QdrantSettings::default()).unwrap();
        assert!(!store.partition_exists("ragdesk-missing").await.unwrap());
    }
}
