// Reranker: applies one strategy and reorders retrieved chunks
use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

use crate::rag::reranking::financial::pad;
use crate::rag::reranking::hybrid::{self, ComponentScores, HybridWeights};
use crate::rag::reranking::{financial, metadata, semantic};
use crate::types::{QueryParams, RerankStrategy, RetrievedChunk, ScoredChunk};

static FISCAL_YEAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:fy\s?)?((?:19|20)\d{2})\b").ok());

/// Words ignored when computing term overlap
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "what", "which", "who", "how", "why", "this",
    "that", "with", "from", "our", "have", "has", "did", "does", "about", "into", "than",
];

/// Query features computed once per rerank call
#[derive(Debug, Clone, PartialEq)]
pub struct QueryProfile {
    /// Lowercased, whitespace-collapsed query without trailing punctuation
    pub phrase: String,
    /// Distinct content terms (lowercase, 3+ chars, no stop words)
    pub terms: Vec<String>,
    pub fiscal_years: Vec<u16>,
    padded: String,
}

impl QueryProfile {
    pub fn new(query: &str) -> Self {
        let phrase = query
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end_matches(|c: char| c.is_ascii_punctuation())
            .to_string();

        let mut terms: Vec<String> = Vec::new();
        for word in query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= 3 && !STOP_WORDS.contains(w))
        {
            if !terms.iter().any(|t| t == word) {
                terms.push(word.to_string());
            }
        }

        let fiscal_years = FISCAL_YEAR
            .as_ref()
            .map(|re| {
                re.captures_iter(query)
                    .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            phrase,
            terms,
            fiscal_years,
            padded: pad(query),
        }
    }

    /// Whole-word (or plural) mention of `text` in the query
    pub fn mentions(&self, text: &str) -> bool {
        let needle = pad(text);
        let needle = needle.trim();
        !needle.is_empty()
            && (self.padded.contains(&format!(" {} ", needle))
                || self.padded.contains(&format!(" {}s ", needle)))
    }
}

/// Per-call reranking options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankOptions {
    /// Results kept after sorting
    pub top_k: usize,
    /// Requested domain type for the metadata strategy
    pub doc_type: Option<String>,
}

impl From<&QueryParams> for RerankOptions {
    fn from(params: &QueryParams) -> Self {
        Self {
            top_k: params.rerank_top_k,
            doc_type: params.doc_type.clone(),
        }
    }
}

/// Ensemble reranker
pub struct Reranker {
    weights: HybridWeights,
    /// Fixed "today" for recency; wall clock when unset
    reference_date: Option<NaiveDate>,
}

impl Reranker {
    /// Create new reranker with default hybrid weights
    pub fn new() -> Self {
        Self {
            weights: HybridWeights::default(),
            reference_date: None,
        }
    }

    /// Pin the date recency is measured against
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Score and reorder chunks.
    ///
    /// Sorting is stable, so equal scores keep their retrieval order, and the
    /// result holds at most `options.top_k` chunks.
    pub fn rerank(
        &self,
        chunks: Vec<RetrievedChunk>,
        query: &str,
        strategy: RerankStrategy,
        options: &RerankOptions,
    ) -> Vec<ScoredChunk> {
        let profile = QueryProfile::new(query);
        let today = self.reference_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut scored: Vec<ScoredChunk> = chunks
            .into_iter()
            .map(|chunk| {
                let rerank_score =
                    self.score(&chunk, &profile, strategy, options.doc_type.as_deref(), today);
                ScoredChunk {
                    chunk,
                    rerank_score,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.rerank_score
                .partial_cmp(&a.rerank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(options.top_k);

        debug!(
            strategy = strategy.as_str(),
            kept = scored.len(),
            top_score = scored.first().map(|s| s.rerank_score),
            "chunks reranked"
        );

        scored
    }

    fn score(
        &self,
        chunk: &RetrievedChunk,
        profile: &QueryProfile,
        strategy: RerankStrategy,
        doc_type: Option<&str>,
        today: NaiveDate,
    ) -> f32 {
        let score = match strategy {
            RerankStrategy::Semantic => semantic::score(chunk, profile),
            RerankStrategy::Metadata => metadata::score(chunk, profile, doc_type),
            RerankStrategy::Financial => financial::score(chunk, profile),
            RerankStrategy::Hybrid => self
                .weights
                .combine(&Self::component_scores(chunk, profile, doc_type, today)),
        };
        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Every signal the hybrid strategy combines
    pub fn component_scores(
        chunk: &RetrievedChunk,
        profile: &QueryProfile,
        doc_type: Option<&str>,
        today: NaiveDate,
    ) -> ComponentScores {
        ComponentScores {
            semantic: semantic::score(chunk, profile),
            metadata: metadata::score(chunk, profile, doc_type),
            financial: financial::score(chunk, profile),
            recency: hybrid::recency(chunk, today),
            confidence: hybrid::confidence(chunk),
        }
    }
}

impl Default for Reranker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn create_test_chunk(id: &str, content: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: id.to_string(),
            partition: "test".to_string(),
            content: content.to_string(),
            similarity_score: score,
            metadata: Map::new(),
        }
    }

    fn options(top_k: usize) -> RerankOptions {
        RerankOptions {
            top_k,
            doc_type: None,
        }
    }

    #[test]
    fn test_query_profile() {
        let profile = QueryProfile::new("What were the top detractors in FY2024?");
        assert_eq!(profile.phrase, "what were the top detractors in fy2024");
        assert_eq!(profile.terms, vec!["top", "detractors", "fy2024"]);
        assert_eq!(profile.fiscal_years, vec![2024]);
        assert!(profile.mentions("detractor"));
        assert!(!profile.mentions("tractor"));
    }

    #[test]
    fn test_rerank_truncates() {
        let ranker = Reranker::new();
        let chunks = (0..8)
            .map(|i| create_test_chunk(&i.to_string(), "content", 0.5))
            .collect();
        let ranked = ranker.rerank(chunks, "query", RerankStrategy::Semantic, &options(3));
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn test_rerank_sort_is_stable() {
        let ranker = Reranker::new();
        let chunks = vec![
            create_test_chunk("1", "same", 0.7),
            create_test_chunk("2", "same", 0.7),
            create_test_chunk("3", "same", 0.7),
        ];
        let ranked = ranker.rerank(chunks, "query", RerankStrategy::Financial, &options(5));
        let ids: Vec<&str> = ranked.iter().map(|s| s.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_similarity_never_overwritten() {
        let ranker = Reranker::new();
        let ranked = ranker.rerank(
            vec![create_test_chunk("1", "detractors", 0.42)],
            "detractors",
            RerankStrategy::Hybrid,
            &options(5),
        );
        assert_eq!(ranked[0].chunk.similarity_score, 0.42);
        assert!((0.0..=1.0).contains(&ranked[0].rerank_score));
    }

    #[test]
    fn test_rerank_metadata_strategy_prefers_type() {
        let ranker = Reranker::new();
        let mut typed = create_test_chunk("typed", "text", 0.5);
        typed
            .metadata
            .insert("doc_type".into(), serde_json::json!("factsheet"));
        let plain = create_test_chunk("plain", "text", 0.6);

        let ranked = ranker.rerank(
            vec![plain, typed],
            "query",
            RerankStrategy::Metadata,
            &RerankOptions {
                top_k: 2,
                doc_type: Some("factsheet".into()),
            },
        );
        assert_eq!(ranked[0].chunk.chunk_id, "typed");
    }
}
