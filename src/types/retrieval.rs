//! Retrieval-side types: categories, chunks and per-request parameters

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Topical category, used only to choose a retrieval partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Attribution,
    Technical,
    Aum,
    General,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Attribution,
        Category::Technical,
        Category::Aum,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Attribution => "attribution",
            Category::Technical => "technical",
            Category::Aum => "aum",
            Category::General => "general",
        }
    }

    /// Look up a raw model token. Unknown tokens yield `None`.
    pub fn from_token(token: &str) -> Option<Self> {
        let cleaned: String = token
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();

        match cleaned.as_str() {
            "attribution" => Some(Category::Attribution),
            "technical" => Some(Category::Technical),
            "aum" | "assets_under_management" => Some(Category::Aum),
            "general" => Some(Category::General),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reranking strategy requested for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RerankStrategy {
    Semantic,
    Metadata,
    Financial,
    #[default]
    Hybrid,
}

impl RerankStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RerankStrategy::Semantic => "semantic",
            RerankStrategy::Metadata => "metadata",
            RerankStrategy::Financial => "financial",
            RerankStrategy::Hybrid => "hybrid",
        }
    }
}

impl FromStr for RerankStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "semantic" => Ok(RerankStrategy::Semantic),
            "metadata" => Ok(RerankStrategy::Metadata),
            "financial" => Ok(RerankStrategy::Financial),
            "hybrid" => Ok(RerankStrategy::Hybrid),
            other => Err(format!(
                "unknown reranking strategy '{}' (expected semantic, metadata, financial or hybrid)",
                other
            )),
        }
    }
}

/// Chunk returned by a partition search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Unique within a partition; the deduplication identity across partitions
    pub chunk_id: String,
    pub partition: String,
    pub content: String,
    /// Vector similarity in [0, 1]
    pub similarity_score: f32,
    pub metadata: Map<String, Value>,
}

impl RetrievedChunk {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn metadata_bool(&self, key: &str) -> bool {
        match self.metadata.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// String entries of an array-valued metadata key
    pub fn metadata_list(&self, key: &str) -> Vec<&str> {
        match self.metadata.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) => s.split(',').map(str::trim).filter(|t| !t.is_empty()).collect(),
            _ => Vec::new(),
        }
    }

    /// Whitespace token count
    pub fn token_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Chunk after reranking. `similarity_score` on the inner chunk is never touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: RetrievedChunk,
    /// Strategy score in [0, 1]
    pub rerank_score: f32,
}

/// Outcome class of a retrieval call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStatus {
    /// At least one chunk survived
    Found,
    /// Probes succeeded (or partitions were absent) but nothing matched
    NoEvidence,
    /// Every attempted probe failed, or the query could not be embedded
    BackendUnavailable,
    /// Retrieval was not attempted
    Skipped,
}

/// Optional prompt overrides supplied with a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOverrides {
    pub system_prompt: Option<String>,
    pub answer_instructions: Option<String>,
}

/// Per-request retrieval and generation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    pub top_k: usize,
    pub rerank_top_k: usize,
    pub similarity_threshold: f32,
    pub strategy: RerankStrategy,
    /// Domain-type filter forwarded to search and metadata scoring
    pub doc_type: Option<String>,
    /// Whether the retrieval stage runs at all
    pub use_rag: bool,
    #[serde(default)]
    pub prompts: PromptOverrides,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            top_k: 10,
            rerank_top_k: 5,
            similarity_threshold: 0.3,
            strategy: RerankStrategy::Hybrid,
            doc_type: None,
            use_rag: true,
            prompts: PromptOverrides::default(),
        }
    }
}

impl QueryParams {
    /// Enforce `1 <= rerank_top_k <= top_k` and a threshold in [0, 1]
    pub fn normalized(mut self) -> Self {
        self.top_k = self.top_k.max(1);
        self.rerank_top_k = self.rerank_top_k.clamp(1, self.top_k);
        self.similarity_threshold = if self.similarity_threshold.is_finite() {
            self.similarity_threshold.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}
