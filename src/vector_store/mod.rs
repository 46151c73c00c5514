//! Vector store and document metadata capabilities
//!
//! Partitions are independently addressable segments of the store
//! (Qdrant collections in production).

pub mod documents;
pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::Result;

pub use documents::{DocumentMetadata, DocumentMetadataCache, InMemoryDocumentCache};
pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantStore;

/// Payload key holding the domain type of a chunk
pub const DOC_TYPE_KEY: &str = "doc_type";

/// Raw search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub payload: Map<String, Value>,
}

/// Exact-match payload conditions, all of which must hold
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub must_match: BTreeMap<String, String>,
}

impl SearchFilter {
    pub fn doc_type(doc_type: impl Into<String>) -> Self {
        let mut must_match = BTreeMap::new();
        must_match.insert(DOC_TYPE_KEY.to_string(), doc_type.into());
        Self { must_match }
    }

    pub fn is_empty(&self) -> bool {
        self.must_match.is_empty()
    }

    /// Check a payload against every condition. Values compare exactly, the
    /// same way a Qdrant keyword match does.
    pub fn matches(&self, payload: &Map<String, Value>) -> bool {
        self.must_match.iter().all(|(key, expected)| {
            payload.get(key).and_then(Value::as_str) == Some(expected.as_str())
        })
    }
}

/// Vector similarity search over named partitions
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether a partition exists
    async fn partition_exists(&self, name: &str) -> Result<bool>;

    /// Nearest neighbours in one partition with score >= `score_threshold`
    async fn search(
        &self,
        partition: &str,
        vector: &[f32],
        filter: Option<&SearchFilter>,
        limit: usize,
        score_threshold: f32,
    ) -> Result<Vec<VectorHit>>;

    /// Names of all partitions
    async fn partitions(&self) -> Result<Vec<String>>;
}
