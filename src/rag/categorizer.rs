//! Model-backed query categorization
//!
//! The category is only a hint for choosing a retrieval partition, so every
//! failure collapses to `General` instead of aborting the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::llm::{GenerationRequest, LanguageModel};
use crate::types::Category;

/// Confidence given to a recognised category token
pub const RECOGNISED_CONFIDENCE: f32 = 0.85;

/// Confidence of the structural fallback
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

const CATEGORIZER_SYSTEM_PROMPT: &str = "You label investment-management questions. \
Reply with exactly one word and nothing else.";

const CATEGORIZER_INSTRUCTIONS: &str = "Classify the question into one category:\n\
- attribution: performance attribution, contributors, detractors, sector or stock effects\n\
- technical: methodology, systems, data definitions, calculations, processes\n\
- aum: assets under management, flows, fund size, client assets\n\
- general: anything else\n\n\
Answer with one of: attribution, technical, aum, general.";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub category: Category,
    pub confidence: f32,
}

impl CategoryAssignment {
    pub fn fallback() -> Self {
        Self {
            category: Category::General,
            confidence: FALLBACK_CONFIDENCE,
        }
    }
}

#[async_trait]
pub trait Categorizer: Send + Sync {
    /// Assign a category; never fails
    async fn categorize(&self, query: &str) -> CategoryAssignment;
}

/// Categorizer that asks the language model for a single token
pub struct LlmCategorizer {
    llm: Arc<dyn LanguageModel>,
}

impl LlmCategorizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    fn request(query: &str) -> GenerationRequest {
        GenerationRequest::new(format!(
            "{}\n\nQuestion: {}\nCategory:",
            CATEGORIZER_INSTRUCTIONS, query
        ))
        .with_system_prompt(CATEGORIZER_SYSTEM_PROMPT)
        .with_temperature(0.0)
        .with_max_tokens(10)
    }

    /// Map raw model output onto a category
    pub fn parse(output: &str) -> CategoryAssignment {
        let token = output.split_whitespace().next().unwrap_or_default();
        match Category::from_token(token) {
            Some(category) => CategoryAssignment {
                category,
                confidence: RECOGNISED_CONFIDENCE,
            },
            None => CategoryAssignment::fallback(),
        }
    }
}

#[async_trait]
impl Categorizer for LlmCategorizer {
    async fn categorize(&self, query: &str) -> CategoryAssignment {
        match self.llm.generate(&Self::request(query)).await {
            Ok(output) => {
                let assignment = Self::parse(&output);
                if assignment.confidence == RECOGNISED_CONFIDENCE {
                    debug!(category = %assignment.category, "query categorized");
                } else {
                    warn!(output = %output.trim(), "unrecognised category token, using general");
                }
                assignment
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "categorization failed, using general");
                CategoryAssignment::fallback()
            }
        }
    }
}

/// Deterministic categorizer for tests and offline runs
#[derive(Debug, Clone, Copy)]
pub struct FixedCategorizer {
    assignment: CategoryAssignment,
}

impl FixedCategorizer {
    pub fn new(category: Category, confidence: f32) -> Self {
        Self {
            assignment: CategoryAssignment {
                category,
                confidence,
            },
        }
    }
}

#[async_trait]
impl Categorizer for FixedCategorizer {
    async fn categorize(&self, _query: &str) -> CategoryAssignment {
        self.assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recognised_tokens() {
        let a = LlmCategorizer::parse("Attribution");
        assert_eq!(a.category, Category::Attribution);
        assert_eq!(a.confidence, RECOGNISED_CONFIDENCE);

        assert_eq!(LlmCategorizer::parse("  aum\n").category, Category::Aum);
        assert_eq!(LlmCategorizer::parse("technical.").category, Category::Technical);
    }

    #[test]
    fn test_parse_unrecognised_falls_back() {
        assert_eq!(LlmCategorizer::parse("performance"), CategoryAssignment::fallback());
        assert_eq!(LlmCategorizer::parse(""), CategoryAssignment::fallback());
    }

    #[test]
    fn test_request_is_near_deterministic() {
        let request = LlmCategorizer::request("top detractors?");
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, 10);
        assert!(request.prompt.contains("top detractors?"));
    }

    #[tokio::test]
    async fn test_fixed_categorizer() {
        let categorizer = FixedCategorizer::new(Category::Technical, 0.9);
        let a = categorizer.categorize("anything").await;
        assert_eq!(a.category, Category::Technical);
        assert_eq!(a.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_unreachable_model_falls_back() {
        let llm = crate::llm::OllamaClient::with_config(
            "http://127.0.0.1:9",
            "m",
            "e",
            std::time::Duration::from_millis(200),
        )
        .unwrap();
        let categorizer = LlmCategorizer::new(Arc::new(llm));
        assert_eq!(
            categorizer.categorize("top detractors").await,
            CategoryAssignment::fallback()
        );
    }
}
