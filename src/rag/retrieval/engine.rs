// Multi-partition retrieval with ordered fallback and deduplication
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::PartitionSettings;
use crate::llm::LanguageModel;
use crate::types::{Category, QueryParams, RetrievalStatus, RetrievedChunk};
use crate::vector_store::{SearchFilter, VectorHit, VectorStore};

/// Payload keys that may hold the chunk text, in lookup order
const CONTENT_KEYS: [&str; 3] = ["content", "text", "document"];

/// Payload key holding the chunk id when it differs from the point id
const CHUNK_ID_KEY: &str = "chunk_id";

/// A partition probe or search that errored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionFailure {
    pub partition: String,
    pub message: String,
}

/// Result of one retrieval call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalOutcome {
    /// Deduplicated, sorted by similarity, at most `top_k` long
    pub chunks: Vec<RetrievedChunk>,
    pub status: RetrievalStatus,
    /// Partitions actually searched, in probe order
    pub partitions_probed: Vec<String>,
    /// Partition of the best chunk
    pub partition_used: Option<String>,
    pub failures: Vec<PartitionFailure>,
}

impl RetrievalOutcome {
    fn unavailable(failures: Vec<PartitionFailure>) -> Self {
        Self {
            chunks: Vec::new(),
            status: RetrievalStatus::BackendUnavailable,
            partitions_probed: Vec::new(),
            partition_used: None,
            failures,
        }
    }

    pub fn skipped() -> Self {
        Self {
            chunks: Vec::new(),
            status: RetrievalStatus::Skipped,
            partitions_probed: Vec::new(),
            partition_used: None,
            failures: Vec::new(),
        }
    }
}

/// Vector search across the category, default and remaining partitions
pub struct ContextRetriever {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn VectorStore>,
    partitions: PartitionSettings,
}

impl ContextRetriever {
    /// Create new retriever
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn VectorStore>,
        partitions: PartitionSettings,
    ) -> Self {
        Self {
            llm,
            store,
            partitions,
        }
    }

    pub fn partitions(&self) -> &PartitionSettings {
        &self.partitions
    }

    /// Candidate order: category partition, default, then every other
    /// configured partition. Existence is checked when probing.
    pub fn probe_order(&self, category: Category) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        let target = self.partitions.for_category(category).to_string();
        let default = self.partitions.default.clone();

        for name in [target, default]
            .into_iter()
            .chain(self.partitions.all())
        {
            if !order.contains(&name) {
                order.push(name);
            }
        }
        order
    }

    /// Retrieve evidence for a query.
    ///
    /// Never fails: partition errors are skipped and reported in the outcome,
    /// and an embedding failure yields `BackendUnavailable`.
    pub async fn retrieve(
        &self,
        query: &str,
        category: Category,
        params: &QueryParams,
    ) -> RetrievalOutcome {
        let params = params.clone().normalized();

        // Step 1: Embed query
        let vector = match self.llm.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "query embedding failed, retrieval unavailable");
                return RetrievalOutcome::unavailable(vec![PartitionFailure {
                    partition: "*".to_string(),
                    message: e.to_string(),
                }]);
            }
        };

        let filter = params.doc_type.as_deref().map(SearchFilter::doc_type);

        // Step 2: Probe partitions in order, stopping once enough candidates exist
        let mut accumulated: Vec<RetrievedChunk> = Vec::new();
        let mut probed = Vec::new();
        let mut failures = Vec::new();
        let mut attempts = 0usize;

        for partition in self.probe_order(category) {
            if accumulated.len() >= params.rerank_top_k {
                break;
            }
            attempts += 1;

            match self.store.partition_exists(&partition).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(partition = %partition, "partition missing, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(partition = %partition, error = %e, "partition probe failed, skipping");
                    failures.push(PartitionFailure {
                        partition,
                        message: e.to_string(),
                    });
                    continue;
                }
            }

            let hits = match self
                .store
                .search(
                    &partition,
                    &vector,
                    filter.as_ref(),
                    params.top_k,
                    params.similarity_threshold,
                )
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(partition = %partition, error = %e, "partition search failed, skipping");
                    failures.push(PartitionFailure {
                        partition,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            debug!(partition = %partition, hits = hits.len(), "partition searched");
            accumulated.extend(hits.into_iter().map(|hit| hit_to_chunk(hit, &partition)));
            probed.push(partition);
        }

        // Step 3: Deduplicate, sort and truncate
        let chunks = finalize(accumulated, params.top_k);

        let status = if !chunks.is_empty() {
            RetrievalStatus::Found
        } else if attempts > 0 && failures.len() == attempts {
            RetrievalStatus::BackendUnavailable
        } else {
            RetrievalStatus::NoEvidence
        };

        debug!(
            category = %category,
            probed = ?probed,
            results = chunks.len(),
            status = ?status,
            "retrieval finished"
        );

        RetrievalOutcome {
            partition_used: chunks.first().map(|c| c.partition.clone()),
            chunks,
            status,
            partitions_probed: probed,
            failures,
        }
    }
}

/// Keep the best score per chunk id, sort descending, cap at `top_k`
pub fn finalize(chunks: Vec<RetrievedChunk>, top_k: usize) -> Vec<RetrievedChunk> {
    let mut best: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<RetrievedChunk> = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        match best.get(&chunk.chunk_id) {
            Some(&index) => {
                if chunk.similarity_score > unique[index].similarity_score {
                    unique[index] = chunk;
                }
            }
            None => {
                best.insert(chunk.chunk_id.clone(), unique.len());
                unique.push(chunk);
            }
        }
    }

    unique.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    unique.truncate(top_k);
    unique
}

fn hit_to_chunk(hit: VectorHit, partition: &str) -> RetrievedChunk {
    let mut metadata: Map<String, Value> = hit.payload;

    let chunk_id = match metadata.remove(CHUNK_ID_KEY) {
        Some(Value::String(id)) if !id.is_empty() => id,
        Some(Value::Number(n)) => n.to_string(),
        _ => hit.id,
    };

    let content = CONTENT_KEYS
        .iter()
        .find_map(|key| match metadata.remove(*key) {
            Some(Value::String(text)) => Some(text),
            _ => None,
        })
        .unwrap_or_default();

    RetrievedChunk {
        chunk_id,
        partition: partition.to_string(),
        content,
        similarity_score: if hit.score.is_finite() {
            hit.score.clamp(0.0, 1.0)
        } else {
            0.0
        },
        metadata,
    }
}
