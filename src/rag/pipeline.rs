// End-to-end pipeline: categorize -> retrieve -> rerank -> generate
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::llm::{FragmentStream, GenerationRequest, LanguageModel};
use crate::rag::categorizer::{CategoryAssignment, Categorizer, LlmCategorizer};
use crate::rag::context::{ContextBuilder, ContextConfig};
use crate::rag::reranking::{RerankOptions, Reranker};
use crate::rag::retrieval::{ContextRetriever, RetrievalOutcome};
use crate::rag::stage::{PipelineStage, StageTracker};
use crate::types::{
    Category, ConversationTurn, PipelineMetadata, QueryParams, RetrievalStatus, Role, ScoredChunk,
    Source,
};
use crate::vector_store::{DocumentMetadataCache, VectorStore};

/// Confidence when no evidence backs the answer
pub const NO_EVIDENCE_CONFIDENCE: f32 = 0.3;

/// Confidence of the apologetic answer after a generation failure
pub const GENERATION_FAILURE_CONFIDENCE: f32 = 0.1;

/// Ceiling for evidence-backed answers
pub const MAX_CONFIDENCE: f32 = 0.95;

pub const NOT_FOUND_MESSAGE: &str = "I couldn't find any relevant information in the knowledge \
base to answer that question. Try rephrasing it, or name the report, fund or period you are \
interested in.";

pub const GENERATION_FAILURE_MESSAGE: &str = "I'm sorry, I wasn't able to put together an answer \
right now. Please try again in a moment.";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an investment analytics assistant. Answer using \
only the numbered context passages you are given and cite them with their [n] markers. If the \
context does not contain the answer, say that you could not find it. Never invent figures.";

pub const DEFAULT_ANSWER_INSTRUCTIONS: &str = "Answer the question concisely using the context \
above. Quote figures exactly as they appear.";

/// Generation settings shared by every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    /// History turns included in the prompt
    pub history_turns: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1024,
            history_turns: 6,
        }
    }
}

/// Result of a pipeline run; always populated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub answer: String,
    pub confidence: f32,
    pub sources: Vec<Source>,
    pub stage_metadata: PipelineMetadata,
}

impl PipelineResult {
    pub fn category(&self) -> Category {
        self.stage_metadata.category
    }

    pub fn retrieval_status(&self) -> RetrievalStatus {
        self.stage_metadata.retrieval_status
    }
}

/// Streaming variant: evidence is known up front, the answer arrives in fragments
pub struct PipelineStream {
    pub fragments: FragmentStream,
    pub confidence: f32,
    pub sources: Vec<Source>,
    /// Records for every stage before generation
    pub stage_metadata: PipelineMetadata,
}

/// Everything gathered before the generation stage
struct Prepared {
    tracker: StageTracker,
    assignment: CategoryAssignment,
    outcome: RetrievalOutcome,
    scored: Vec<ScoredChunk>,
    sources: Vec<Source>,
    /// `None` when retrieval found nothing and generation is skipped
    request: Option<GenerationRequest>,
}

impl Prepared {
    fn answered_confidence(&self) -> f32 {
        if self.scored.is_empty() {
            NO_EVIDENCE_CONFIDENCE
        } else {
            (self.assignment.confidence + 0.1).min(MAX_CONFIDENCE)
        }
    }

    fn metadata(&self, tracker: StageTracker, overall_confidence: f32) -> PipelineMetadata {
        PipelineMetadata {
            stages: tracker.into_records(),
            overall_confidence,
            partition_used: self.outcome.partition_used.clone(),
            category: self.assignment.category,
            category_confidence: self.assignment.confidence,
            retrieval_status: self.outcome.status,
        }
    }
}

/// Sequences categorization, retrieval, reranking and generation
pub struct PipelineOrchestrator {
    llm: Arc<dyn LanguageModel>,
    categorizer: Arc<dyn Categorizer>,
    retriever: ContextRetriever,
    reranker: Reranker,
    context_builder: ContextBuilder,
    documents: Arc<dyn DocumentMetadataCache>,
    generation: GenerationSettings,
}

impl PipelineOrchestrator {
    /// Create new orchestrator from configuration
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn VectorStore>,
        documents: Arc<dyn DocumentMetadataCache>,
        config: &Config,
    ) -> Self {
        Self {
            categorizer: Arc::new(LlmCategorizer::new(llm.clone())),
            retriever: ContextRetriever::new(llm.clone(), store, config.partitions.clone()),
            reranker: Reranker::new(),
            context_builder: ContextBuilder::with_config(ContextConfig {
                max_context_tokens: config.pipeline.max_context_tokens,
                include_metadata: true,
            }),
            documents,
            generation: GenerationSettings {
                temperature: config.pipeline.temperature,
                max_tokens: config.pipeline.max_tokens,
                history_turns: config.pipeline.history_turns,
            },
            llm,
        }
    }

    /// Replace the categorizer (deterministic stubs in tests)
    pub fn with_categorizer(mut self, categorizer: Arc<dyn Categorizer>) -> Self {
        self.categorizer = categorizer;
        self
    }

    pub fn retriever(&self) -> &ContextRetriever {
        &self.retriever
    }

    pub fn generation_settings(&self) -> &GenerationSettings {
        &self.generation
    }

    /// Run the whole pipeline.
    ///
    /// Never fails: empty retrieval yields the not-found answer, and a
    /// generation error yields an apologetic answer with confidence 0.1.
    pub async fn process(
        &self,
        query: &str,
        history: &[ConversationTurn],
        params: &QueryParams,
    ) -> PipelineResult {
        let started = Instant::now();
        let mut prepared = self.prepare(query, history, params).await;
        let mut tracker = std::mem::replace(&mut prepared.tracker, StageTracker::new(false));

        let (answer, confidence) = match prepared.request.as_ref() {
            None => {
                tracker.complete("skipped: no evidence");
                (NOT_FOUND_MESSAGE.to_string(), NO_EVIDENCE_CONFIDENCE)
            }
            Some(request) => match self.llm.generate(request).await {
                Ok(answer) => {
                    tracker.complete(format!("{} chars", answer.len()));
                    (answer.trim().to_string(), prepared.answered_confidence())
                }
                Err(e) => {
                    warn!(error = %e, kind = e.kind(), "generation failed, returning apology");
                    tracker.complete(format!("failed: {}", e.kind()));
                    (
                        GENERATION_FAILURE_MESSAGE.to_string(),
                        GENERATION_FAILURE_CONFIDENCE,
                    )
                }
            },
        };
        debug_assert_eq!(tracker.stage(), PipelineStage::Done);

        info!(
            category = %prepared.assignment.category,
            status = ?prepared.outcome.status,
            sources = prepared.sources.len(),
            confidence,
            duration_ms = started.elapsed().as_millis() as u64,
            "pipeline finished"
        );

        let stage_metadata = prepared.metadata(tracker, confidence);
        PipelineResult {
            answer,
            confidence,
            sources: std::mem::take(&mut prepared.sources),
            stage_metadata,
        }
    }

    /// Run categorize/retrieve/rerank, then stream the generated answer
    pub async fn process_stream(
        &self,
        query: &str,
        history: &[ConversationTurn],
        params: &QueryParams,
    ) -> PipelineStream {
        let mut prepared = self.prepare(query, history, params).await;
        let tracker = std::mem::replace(&mut prepared.tracker, StageTracker::new(false));

        let (fragments, confidence) = match prepared.request.as_ref() {
            None => (
                single_fragment(NOT_FOUND_MESSAGE),
                NO_EVIDENCE_CONFIDENCE,
            ),
            Some(request) => match self.llm.generate_stream(request).await {
                Ok(fragments) => (fragments, prepared.answered_confidence()),
                Err(e) => {
                    warn!(error = %e, kind = e.kind(), "streaming generation failed to start");
                    (
                        single_fragment(GENERATION_FAILURE_MESSAGE),
                        GENERATION_FAILURE_CONFIDENCE,
                    )
                }
            },
        };

        let stage_metadata = prepared.metadata(tracker, confidence);
        PipelineStream {
            fragments,
            confidence,
            sources: std::mem::take(&mut prepared.sources),
            stage_metadata,
        }
    }

    async fn prepare(
        &self,
        query: &str,
        history: &[ConversationTurn],
        params: &QueryParams,
    ) -> Prepared {
        let params = params.clone().normalized();
        let mut tracker = StageTracker::new(params.use_rag);

        // Step 1: Categorize
        let assignment = self.categorizer.categorize(query).await;
        tracker.complete(format!(
            "{} ({:.2})",
            assignment.category, assignment.confidence
        ));

        // Step 2: Retrieve and rerank
        let (outcome, scored) = if tracker.stage() == PipelineStage::Retrieving {
            let outcome = self.retriever.retrieve(query, assignment.category, &params).await;
            tracker.record(
                "retrieve",
                format!(
                    "{} chunks from {} partitions ({:?})",
                    outcome.chunks.len(),
                    outcome.partitions_probed.len(),
                    outcome.status
                ),
            );

            let scored = self.reranker.rerank(
                outcome.chunks.clone(),
                query,
                params.strategy,
                &RerankOptions::from(&params),
            );
            tracker.record(
                "rerank",
                format!("{} kept ({})", scored.len(), params.strategy.as_str()),
            );
            tracker.advance();
            (outcome, scored)
        } else {
            (RetrievalOutcome::skipped(), Vec::new())
        };

        let sources = self
            .context_builder
            .sources(&scored, self.documents.as_ref())
            .await;

        // Step 3: Build the generation request
        let request = if params.use_rag && scored.is_empty() {
            debug!(status = ?outcome.status, "no evidence, skipping generation");
            None
        } else {
            Some(self.build_request(query, history, &scored, &params))
        };

        Prepared {
            tracker,
            assignment,
            outcome,
            scored,
            sources,
            request,
        }
    }

    fn build_request(
        &self,
        query: &str,
        history: &[ConversationTurn],
        scored: &[ScoredChunk],
        params: &QueryParams,
    ) -> GenerationRequest {
        let system_prompt = params
            .prompts
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let instructions = params
            .prompts
            .answer_instructions
            .as_deref()
            .unwrap_or(DEFAULT_ANSWER_INSTRUCTIONS);

        let mut prompt = format_history(history, self.generation.history_turns);
        let context = self.context_builder.build(scored);
        if !context.is_empty() {
            prompt.push_str(&context.text);
            prompt.push('\n');
        }
        prompt.push_str(instructions);
        prompt.push_str("\n\nQuestion: ");
        prompt.push_str(query);

        GenerationRequest::new(prompt)
            .with_system_prompt(system_prompt)
            .with_temperature(self.generation.temperature)
            .with_max_tokens(self.generation.max_tokens)
    }
}

/// Render the last `turns` history entries as a prompt preamble
pub fn format_history(history: &[ConversationTurn], turns: usize) -> String {
    let start = history.len().saturating_sub(turns);
    let recent = &history[start..];
    if recent.is_empty() {
        return String::new();
    }

    let mut text = String::from("Conversation so far:\n");
    for turn in recent {
        let speaker = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        text.push_str(speaker);
        text.push_str(": ");
        text.push_str(turn.content.trim());
        text.push('\n');
    }
    text.push('\n');
    text
}

fn single_fragment(text: &str) -> FragmentStream {
    stream::once(futures_util::future::ready(Ok(text.to_string()))).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::categorizer::FixedCategorizer;
    use crate::rag::test_support::ScriptedModel;
    use crate::vector_store::{InMemoryDocumentCache, InMemoryVectorStore};
    use serde_json::{json, Map};

    fn orchestrator(model: ScriptedModel, store: Arc<InMemoryVectorStore>) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            Arc::new(model),
            store,
            Arc::new(InMemoryDocumentCache::new()),
            &Config::default(),
        )
        .with_categorizer(Arc::new(FixedCategorizer::new(Category::Attribution, 0.85)))
    }

    async fn seeded_store() -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        for (id, content) in [
            ("c1", "Energy was the largest detractor, costing 45bps."),
            ("c2", "Technology contributed 60bps of excess return."),
        ] {
            let mut payload = Map::new();
            payload.insert("chunk_id".into(), json!(id));
            payload.insert("content".into(), json!(content));
            store
                .upsert("attribution_reports", id, vec![1.0, 0.0], payload)
                .await;
        }
        store
    }

    #[tokio::test]
    async fn test_empty_store_returns_not_found() {
        let model = ScriptedModel::new();
        let pipeline = orchestrator(model.clone(), Arc::new(InMemoryVectorStore::new()));

        let result = pipeline
            .process("top detractors", &[], &QueryParams::default())
            .await;
        assert_eq!(result.answer, NOT_FOUND_MESSAGE);
        assert_eq!(result.confidence, NO_EVIDENCE_CONFIDENCE);
        assert!(result.sources.is_empty());
        assert_eq!(result.retrieval_status(), RetrievalStatus::NoEvidence);
        assert_eq!(model.generate_calls(), 0);

        let names: Vec<&str> = result
            .stage_metadata
            .stages
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["categorize", "retrieve", "rerank", "generate"]);
    }

    #[tokio::test]
    async fn test_evidence_backed_answer() {
        let model = ScriptedModel::new().with_answer("Energy detracted most [1].");
        let pipeline = orchestrator(model.clone(), seeded_store().await);

        let result = pipeline
            .process("top detractors", &[], &QueryParams::default())
            .await;
        assert_eq!(result.answer, "Energy detracted most [1].");
        assert!((result.confidence - 0.95).abs() < 1e-6);
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.category(), Category::Attribution);
        assert_eq!(
            result.stage_metadata.partition_used.as_deref(),
            Some("attribution_reports")
        );

        let prompt = model.last_prompt().unwrap();
        assert!(prompt.contains("[1]"));
        assert!(prompt.ends_with("Question: top detractors"));
    }

    #[tokio::test]
    async fn test_generation_failure_degrades() {
        let model = ScriptedModel::new().failing_generation();
        let pipeline = orchestrator(model, seeded_store().await);

        let result = pipeline
            .process("top detractors", &[], &QueryParams::default())
            .await;
        assert_eq!(result.answer, GENERATION_FAILURE_MESSAGE);
        assert_eq!(result.confidence, GENERATION_FAILURE_CONFIDENCE);
        assert_eq!(result.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_retrieval_disabled_still_generates() {
        let model = ScriptedModel::new().with_answer("From general knowledge.");
        let pipeline = orchestrator(model.clone(), seeded_store().await);
        let params = QueryParams {
            use_rag: false,
            ..Default::default()
        };

        let result = pipeline.process("what is alpha?", &[], &params).await;
        assert_eq!(result.answer, "From general knowledge.");
        assert_eq!(result.confidence, NO_EVIDENCE_CONFIDENCE);
        assert_eq!(result.retrieval_status(), RetrievalStatus::Skipped);
        assert_eq!(result.stage_metadata.stages.len(), 2);
        assert_eq!(model.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_prompt_overrides_and_history() {
        let model = ScriptedModel::new();
        let pipeline = orchestrator(model.clone(), seeded_store().await);
        let mut params = QueryParams::default();
        params.prompts.system_prompt = Some("Be terse.".into());
        params.prompts.answer_instructions = Some("One sentence.".into());
        let history = vec![
            ConversationTurn::user("How did Q3 go?"),
            ConversationTurn::assistant("Returns were positive."),
        ];

        pipeline.process("and the detractors?", &history, &params).await;
        let request = model.last_request().unwrap();
        assert_eq!(request.system_prompt.as_deref(), Some("Be terse."));
        assert!(request.prompt.starts_with("Conversation so far:\nUser: How did Q3 go?"));
        assert!(request.prompt.contains("One sentence."));
    }

    #[tokio::test]
    async fn test_stream_yields_not_found() {
        let pipeline = orchestrator(ScriptedModel::new(), Arc::new(InMemoryVectorStore::new()));
        let streamed = pipeline
            .process_stream("top detractors", &[], &QueryParams::default())
            .await;
        let fragments: Vec<String> = streamed
            .fragments
            .filter_map(|f| async move { f.ok() })
            .collect()
            .await;
        assert_eq!(fragments.concat(), NOT_FOUND_MESSAGE);
        assert_eq!(streamed.confidence, NO_EVIDENCE_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_stream_answer_fragments() {
        let model = ScriptedModel::new().with_answer("Energy detracted most.");
        let pipeline = orchestrator(model, seeded_store().await);
        let streamed = pipeline
            .process_stream("top detractors", &[], &QueryParams::default())
            .await;
        let names: Vec<&str> = streamed
            .stage_metadata
            .stages
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["categorize", "retrieve", "rerank"]);

        let fragments: Vec<String> = streamed
            .fragments
            .filter_map(|f| async move { f.ok() })
            .collect()
            .await;
        assert_eq!(fragments.concat(), "Energy detracted most.");
    }

    #[test]
    fn test_format_history_window() {
        let history: Vec<ConversationTurn> = (0..10)
            .map(|i| ConversationTurn::user(format!("turn {}", i)))
            .collect();
        let text = format_history(&history, 2);
        assert!(text.contains("turn 8"));
        assert!(text.contains("turn 9"));
        assert!(!text.contains("turn 7"));
        assert_eq!(format_history(&[], 6), "");
    }
}
