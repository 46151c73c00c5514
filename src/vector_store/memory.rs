//! In-process vector store with cosine similarity
//!
//! Backs tests and offline runs. Scores are clamped to [0, 1].

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::errors::Result;
use crate::vector_store::{SearchFilter, VectorHit, VectorStore};

#[derive(Debug, Clone)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    partitions: RwLock<HashMap<String, Vec<StoredPoint>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty partition (no-op if it exists)
    pub async fn create_partition(&self, name: &str) {
        self.partitions
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    /// Insert or replace a point, creating the partition if needed
    pub async fn upsert(
        &self,
        partition: &str,
        id: &str,
        vector: Vec<f32>,
        payload: Map<String, Value>,
    ) {
        let mut partitions = self.partitions.write().await;
        let points = partitions.entry(partition.to_string()).or_default();
        points.retain(|p| p.id != id);
        points.push(StoredPoint {
            id: id.to_string(),
            vector,
            payload,
        });
    }

    pub async fn len(&self, partition: &str) -> usize {
        self.partitions
            .read()
            .await
            .get(partition)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn partition_exists(&self, name: &str) -> Result<bool> {
        Ok(self.partitions.read().await.contains_key(name))
    }

    async fn search(
        &self,
        partition: &str,
        vector: &[f32],
        filter: Option<&SearchFilter>,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<VectorHit>> {
        let partitions = self.partitions.read().await;
        let Some(points) = partitions.get(partition) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<VectorHit> = points
            .iter()
            .filter(|p| filter.map(|f| f.matches(&p.payload)).unwrap_or(true))
            .map(|p| VectorHit {
                id: p.id.clone(),
                score: cosine_similarity(vector, &p.vector).clamp(0.0, 1.0),
                payload: p.payload.clone(),
            })
            .filter(|hit| hit.score >= score_threshold)
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        Ok(hits)
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.partitions.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(doc_type: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("doc_type".into(), json!(doc_type));
        map
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_search_orders_filters_and_limits() {
        let store = InMemoryVectorStore::new();
        store.upsert("p", "a", vec![1.0, 0.0], payload("report")).await;
        store.upsert("p", "b", vec![0.8, 0.6], payload("report")).await;
        store.upsert("p", "c", vec![0.0, 1.0], payload("report")).await;
        store.upsert("p", "d", vec![0.9, 0.1], payload("memo")).await;

        let hits = store
            .search("p", &[1.0, 0.0], Some(&SearchFilter::doc_type("report")), 5, 0.5)
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let hits = store.search("p", &[1.0, 0.0], None, 1, 0.0).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn test_missing_partition() {
        let store = InMemoryVectorStore::new();
        assert!(!store.partition_exists("nope").await.unwrap());
        assert!(store.search("nope", &[1.0], None, 5, 0.0).await.unwrap().is_empty());

        store.create_partition("empty").await;
        assert!(store.partition_exists("empty").await.unwrap());
        assert_eq!(store.partitions().await.unwrap(), vec!["empty".to_string()]);
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = InMemoryVectorStore::new();
        store.upsert("p", "a", vec![1.0], Map::new()).await;
        store.upsert("p", "a", vec![0.5], Map::new()).await;
        assert_eq!(store.len("p").await, 1);
    }
}
