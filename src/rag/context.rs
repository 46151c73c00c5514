// Context builder for evidence-grounded prompts
use serde::{Deserialize, Serialize};

use crate::types::{ScoredChunk, Source};
use crate::vector_store::DocumentMetadataCache;

/// Rough characters-per-token ratio used for budgeting
const CHARS_PER_TOKEN: usize = 4;

/// Characters kept in a source excerpt
const EXCERPT_CHARS: usize = 200;

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum tokens for retrieved context
    pub max_context_tokens: usize,
    /// Include partition and score next to each chunk
    pub include_metadata: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 3000,
            include_metadata: true,
        }
    }
}

/// Assembled context for prompt augmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// The formatted context text
    pub text: String,
    /// Number of chunks included
    pub chunk_count: usize,
    /// Estimated token count
    pub estimated_tokens: usize,
    /// Chunk IDs included, in prompt order
    pub chunk_ids: Vec<String>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.chunk_count == 0
    }
}

/// Context builder for assembling retrieved evidence
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    /// Create new context builder with default config
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Build a numbered context block from reranked chunks.
    ///
    /// Chunks are added in rank order until the token budget is spent. A
    /// first chunk larger than the whole budget is cut to fit.
    pub fn build(&self, chunks: &[ScoredChunk]) -> AssembledContext {
        let budget = self.config.max_context_tokens;
        let mut context_parts = Vec::new();
        let mut total_tokens = 0;
        let mut included_ids = Vec::new();

        for scored in chunks {
            let chunk = &scored.chunk;
            let mut content = chunk.content.trim().to_string();
            let mut chunk_tokens = estimate_tokens(&content);

            if total_tokens + chunk_tokens > budget {
                if !context_parts.is_empty() {
                    break;
                }
                content = content.chars().take(budget * CHARS_PER_TOKEN).collect();
                chunk_tokens = estimate_tokens(&content);
            }

            let index = context_parts.len() + 1;
            let formatted = if self.config.include_metadata {
                format!(
                    "[{}] (source: {}, relevance: {:.2})\n{}",
                    index, chunk.partition, scored.rerank_score, content
                )
            } else {
                format!("[{}] {}", index, content)
            };
            context_parts.push(formatted);

            total_tokens += chunk_tokens;
            included_ids.push(chunk.chunk_id.clone());
        }

        let text = if context_parts.is_empty() {
            String::new()
        } else {
            format!("Context:\n{}\n", context_parts.join("\n\n"))
        };

        AssembledContext {
            text,
            chunk_count: included_ids.len(),
            estimated_tokens: total_tokens,
            chunk_ids: included_ids,
        }
    }

    /// Citation records for the chunks, with display fields hydrated from
    /// the document cache where the payload lacks them
    pub async fn sources(
        &self,
        chunks: &[ScoredChunk],
        documents: &dyn DocumentMetadataCache,
    ) -> Vec<Source> {
        let mut sources = Vec::with_capacity(chunks.len());

        for scored in chunks {
            let chunk = &scored.chunk;
            let document_id = chunk.metadata_str("document_id").map(str::to_string);

            let mut title = chunk
                .metadata_str("title")
                .or_else(|| chunk.metadata_str("filename"))
                .map(str::to_string);
            if title.is_none() {
                if let Some(id) = document_id.as_deref() {
                    title = documents
                        .lookup(id)
                        .await
                        .and_then(|doc| doc.display_name().map(str::to_string));
                }
            }

            let page = chunk
                .metadata_f64("page_number")
                .or_else(|| chunk.metadata_f64("page"))
                .filter(|p| *p >= 0.0)
                .map(|p| p as u32);

            sources.push(Source {
                chunk_id: chunk.chunk_id.clone(),
                partition: chunk.partition.clone(),
                document_id,
                title,
                page,
                similarity_score: chunk.similarity_score,
                rerank_score: scored.rerank_score,
                excerpt: excerpt(&chunk.content),
            });
        }

        sources
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(CHARS_PER_TOKEN)
}

fn excerpt(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}
