//! Retrieval pipeline end to end over the in-memory vector store

mod common;

use std::sync::Arc;

use common::{seed, FailingStore, ScriptedModel};
use ragdesk::config::Config;
use ragdesk::rag::{PipelineOrchestrator, NOT_FOUND_MESSAGE, NO_EVIDENCE_CONFIDENCE};
use ragdesk::types::{Category, QueryParams, RetrievalStatus};
use ragdesk::vector_store::{InMemoryDocumentCache, InMemoryVectorStore, VectorStore};

fn create_test_pipeline(model: Arc<ScriptedModel>, store: Arc<dyn VectorStore>) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        model,
        store,
        Arc::new(InMemoryDocumentCache::new()),
        &Config::default(),
    )
}

#[tokio::test]
async fn test_empty_store_returns_not_found_without_generating() {
    let model = Arc::new(ScriptedModel::new());
    let pipeline = create_test_pipeline(model.clone(), Arc::new(InMemoryVectorStore::new()));

    let result = pipeline
        .process("top 3 detractors in Q3", &[], &QueryParams::default())
        .await;

    assert_eq!(result.answer, NOT_FOUND_MESSAGE);
    assert_eq!(result.confidence, NO_EVIDENCE_CONFIDENCE);
    assert!(result.sources.is_empty());
    assert_eq!(result.retrieval_status(), RetrievalStatus::NoEvidence);
    assert_eq!(model.generate_calls(), 0);
}

#[tokio::test]
async fn test_category_partition_is_probed_first() {
    let store = Arc::new(InMemoryVectorStore::new());
    for i in 0..5 {
        seed(&store, "attribution_reports", &format!("a{}", i), "Apple detracted 40bps", 0.8).await;
    }
    seed(&store, "documents", "d0", "Fallback document", 0.95).await;

    let model = Arc::new(ScriptedModel::new());
    let pipeline = create_test_pipeline(model, store);

    let outcome = pipeline
        .retriever()
        .retrieve("top 3 detractors", Category::Attribution, &QueryParams::default())
        .await;

    assert_eq!(outcome.status, RetrievalStatus::Found);
    assert_eq!(outcome.partitions_probed, vec!["attribution_reports".to_string()]);
    assert!(outcome.chunks.iter().all(|c| c.partition == "attribution_reports"));
    assert_eq!(outcome.partition_used.as_deref(), Some("attribution_reports"));
}

#[tokio::test]
async fn test_fallback_partitions_fill_a_sparse_category() {
    let store = Arc::new(InMemoryVectorStore::new());
    seed(&store, "attribution_reports", "a0", "Only one attribution chunk", 0.7).await;
    seed(&store, "documents", "d0", "Default partition chunk", 0.9).await;
    seed(&store, "technical_docs", "t0", "Technical chunk", 0.5).await;

    let pipeline = create_test_pipeline(Arc::new(ScriptedModel::new()), store);
    let outcome = pipeline
        .retriever()
        .retrieve("attribution", Category::Attribution, &QueryParams::default())
        .await;

    assert_eq!(
        outcome.partitions_probed,
        vec![
            "attribution_reports".to_string(),
            "documents".to_string(),
            "technical_docs".to_string(),
        ]
    );
    let ids: Vec<&str> = outcome.chunks.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["d0", "a0", "t0"]);
    assert_eq!(outcome.partition_used.as_deref(), Some("documents"));
}

#[tokio::test]
async fn test_duplicate_chunk_keeps_higher_score() {
    let store = Arc::new(InMemoryVectorStore::new());
    seed(&store, "attribution_reports", "shared", "Same chunk, weaker match", 0.6).await;
    seed(&store, "documents", "shared", "Same chunk, stronger match", 0.9).await;

    let pipeline = create_test_pipeline(Arc::new(ScriptedModel::new()), store);
    let outcome = pipeline
        .retriever()
        .retrieve("detractors", Category::Attribution, &QueryParams::default())
        .await;

    assert_eq!(outcome.chunks.len(), 1);
    assert_eq!(outcome.chunks[0].partition, "documents");
    assert!((outcome.chunks[0].similarity_score - 0.9).abs() < 1e-3);
}

#[tokio::test]
async fn test_answer_cites_reranked_sources() {
    let store = Arc::new(InMemoryVectorStore::new());
    seed(&store, "attribution_reports", "a0", "Apple was the top detractor in Q3", 0.9).await;
    seed(&store, "attribution_reports", "a1", "Microsoft contributed 25bps", 0.7).await;

    let model = Arc::new(ScriptedModel::new());
    let pipeline = create_test_pipeline(model.clone(), store);
    let params = QueryParams {
        rerank_top_k: 2,
        ..QueryParams::default()
    };

    let result = pipeline.process("top detractors in Q3", &[], &params).await;

    assert_eq!(result.answer, "Scripted answer");
    assert_eq!(result.category(), Category::Attribution);
    assert!((result.confidence - 0.95).abs() < 1e-6);
    assert_eq!(result.sources.len(), 2);
    assert_eq!(model.generate_calls(), 1);

    let stage_names: Vec<&str> = result
        .stage_metadata
        .stages
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(stage_names, vec!["categorize", "retrieve", "rerank", "generate"]);
}

#[tokio::test]
async fn test_unreachable_store_is_reported_as_unavailable() {
    let pipeline = create_test_pipeline(Arc::new(ScriptedModel::new()), Arc::new(FailingStore));

    let result = pipeline
        .process("top 3 detractors", &[], &QueryParams::default())
        .await;

    assert_eq!(result.retrieval_status(), RetrievalStatus::BackendUnavailable);
    assert!(result.sources.is_empty());
    assert_eq!(result.confidence, NO_EVIDENCE_CONFIDENCE);
}

#[tokio::test]
async fn test_retrieval_disabled_skips_search() {
    let store = Arc::new(InMemoryVectorStore::new());
    seed(&store, "attribution_reports", "a0", "Never searched", 0.9).await;

    let model = Arc::new(ScriptedModel::new());
    let pipeline = create_test_pipeline(model.clone(), store);
    let params = QueryParams {
        use_rag: false,
        ..QueryParams::default()
    };

    let result = pipeline.process("top detractors", &[], &params).await;

    assert_eq!(result.retrieval_status(), RetrievalStatus::Skipped);
    assert!(result.sources.is_empty());
    assert_eq!(model.generate_calls(), 1);
}
