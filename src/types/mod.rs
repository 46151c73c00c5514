//! Type definitions module
//!
//! Core data model shared by the router, the retrieval pipeline and the
//! session coordinator.

pub mod classification;
pub mod envelope;
pub mod retrieval;

// Re-export commonly used types
pub use classification::{
    Classification, ClassificationType, ConversationTurn, ExtractedInfo, Role, RoutingDecision,
};
pub use envelope::{AgentResponse, PipelineMetadata, ResponseEnvelope, Source, StageRecord};
pub use retrieval::{
    Category, PromptOverrides, QueryParams, RerankStrategy, RetrievalStatus, RetrievedChunk,
    ScoredChunk,
};
