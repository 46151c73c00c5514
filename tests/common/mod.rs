//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ragdesk::config::Config;
use ragdesk::coordinator::SessionCoordinator;
use ragdesk::llm::{FragmentStream, GenerationRequest, LanguageModel};
use ragdesk::memory::ConversationMemory;
use ragdesk::vector_store::{
    InMemoryDocumentCache, InMemoryVectorStore, SearchFilter, VectorHit, VectorStore,
};
use ragdesk::{RagError, Result};

/// Query vector returned by `ScriptedModel::embed`
pub const QUERY_VECTOR: [f32; 2] = [1.0, 0.0];

/// Language model with canned answers
pub struct ScriptedModel {
    pub answer: String,
    pub category: String,
    pub fail_embeddings: bool,
    pub fail_generation: bool,
    generate_calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            answer: "Scripted answer".to_string(),
            category: "attribution".to_string(),
            fail_embeddings: false,
            fail_generation: false,
            generate_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn failing_embeddings(mut self) -> Self {
        self.fail_embeddings = true;
        self
    }

    /// Answer generations, categorization prompts excluded
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    fn respond(&self, request: &GenerationRequest) -> Result<String> {
        if request.prompt.ends_with("Category:") {
            return Ok(self.category.clone());
        }
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_generation {
            return Err(RagError::Generation("scripted failure".into()));
        }
        Ok(self.answer.clone())
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        if self.fail_embeddings {
            return Err(RagError::Embedding("scripted failure".into()));
        }
        Ok(QUERY_VECTOR.to_vec())
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.respond(request)
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<FragmentStream> {
        let answer = self.respond(request)?;
        let fragments: Vec<Result<String>> = answer
            .split_inclusive(' ')
            .map(|f| Ok(f.to_string()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }
}

/// Vector store whose every call fails
pub struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    async fn partition_exists(&self, name: &str) -> Result<bool> {
        Err(RagError::VectorStore(format!("{} unreachable", name)))
    }

    async fn search(
        &self,
        partition: &str,
        _vector: &[f32],
        _filter: Option<&SearchFilter>,
        _limit: usize,
        _score_threshold: f32,
    ) -> Result<Vec<VectorHit>> {
        Err(RagError::VectorStore(format!("{} unreachable", partition)))
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        Err(RagError::VectorStore("unreachable".into()))
    }
}

/// Unit vector whose cosine similarity with `QUERY_VECTOR` is `score`
pub fn vector_with_similarity(score: f32) -> Vec<f32> {
    vec![score, (1.0 - score * score).max(0.0).sqrt()]
}

pub fn payload(content: &str, extra: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("content".to_string(), json!(content));
    if let Value::Object(extra) = extra {
        map.extend(extra);
    }
    map
}

/// Insert a chunk whose search similarity will be `score`
pub async fn seed(store: &InMemoryVectorStore, partition: &str, id: &str, content: &str, score: f32) {
    store
        .upsert(
            partition,
            id,
            vector_with_similarity(score),
            payload(content, json!({ "chunk_id": id })),
        )
        .await;
}

pub fn create_test_coordinator(
    model: Arc<ScriptedModel>,
    store: Arc<dyn VectorStore>,
) -> SessionCoordinator {
    SessionCoordinator::new(
        model,
        store,
        Arc::new(InMemoryDocumentCache::new()),
        Arc::new(ConversationMemory::new()),
        &Config::default(),
    )
}
