//! Error types for the ragdesk query pipeline
//!
//! Every stage boundary catches these and converts them into a degraded,
//! still-valid result. They surface to callers only through logs and
//! stage metadata, never as a raw failure of `SessionCoordinator::handle`.

use thiserror::Error;

/// Main error type for the query-processing pipeline
#[derive(Error, Debug)]
pub enum RagError {
    /// Category model call failed or returned something unusable
    #[error("Categorization failed: {0}")]
    Categorization(String),

    /// A partition probe or search failed
    #[error("Retrieval from partition '{partition}' failed: {message}")]
    Retrieval { partition: String, message: String },

    /// Embedding generation failed
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Text generation failed
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Vector store client errors
    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Generic errors with context
    #[error("Pipeline error: {0}")]
    Generic(String),
}

impl RagError {
    /// Short machine-friendly label used in structured logs and stage records
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::Categorization(_) => "categorization",
            RagError::Retrieval { .. } => "retrieval",
            RagError::Embedding(_) => "embedding",
            RagError::Generation(_) => "generation",
            RagError::VectorStore(_) => "vector_store",
            RagError::Http(_) => "http",
            RagError::Serialization(_) => "serialization",
            RagError::Io(_) => "io",
            RagError::Config(_) => "config",
            RagError::Timeout { .. } => "timeout",
            RagError::Generic(_) => "generic",
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Convert anyhow errors to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Generic(err.to_string())
    }
}
