//! Retrieval-augmented answering pipeline
//!
//! Components:
//! - Categorizer: model-backed topical category, used to pick a partition
//! - Context Retriever: multi-partition search with fallback and deduplication
//! - Reranker: semantic, metadata, financial and hybrid strategies
//! - Context Builder: numbered evidence block and source records
//! - Pipeline Orchestrator: categorize → retrieve → generate

pub mod categorizer;
pub mod context;
pub mod pipeline;
pub mod reranking;
pub mod retrieval;
pub mod stage;

// Re-export key types
pub use categorizer::{Categorizer, CategoryAssignment, FixedCategorizer, LlmCategorizer};
pub use context::{AssembledContext, ContextBuilder, ContextConfig};
pub use pipeline::{
    GenerationSettings, PipelineOrchestrator, PipelineResult, PipelineStream,
    GENERATION_FAILURE_CONFIDENCE, GENERATION_FAILURE_MESSAGE, NOT_FOUND_MESSAGE,
    NO_EVIDENCE_CONFIDENCE,
};
pub use reranking::{RerankOptions, Reranker};
pub use retrieval::{ContextRetriever, RetrievalOutcome};
pub use stage::{PipelineStage, StageTracker};
