// Reranking strategies: semantic, metadata, financial and hybrid
pub mod financial;
pub mod hybrid;
pub mod metadata;
pub mod scorer;
pub mod semantic;

pub use hybrid::{ComponentScores, HybridWeights};
pub use scorer::{QueryProfile, RerankOptions, Reranker};
