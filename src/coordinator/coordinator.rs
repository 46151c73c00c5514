use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::coordinator::handlers::{self, *};
use crate::errors::{RagError, Result};
use crate::llm::{GenerationRequest, LanguageModel};
use crate::memory::{MemoryStore, PersonalFacts, SessionLocks, TranscriptStore};
use crate::rag::{
    PipelineOrchestrator, PipelineResult, PipelineStream, GENERATION_FAILURE_CONFIDENCE,
    GENERATION_FAILURE_MESSAGE,
};
use crate::router::QueryRouter;
use crate::types::{
    AgentResponse, Classification, ConversationTurn, ExtractedInfo, QueryParams,
    ResponseEnvelope, RetrievalStatus, RoutingDecision,
};
use crate::vector_store::{DocumentMetadataCache, VectorStore};

/// One query with its session context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub session_id: String,
    pub query: String,
    /// Ordered, most-recent-last
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    pub params: QueryParams,
}

impl QueryRequest {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            history: Vec::new(),
            params: QueryParams::default(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }
}

/// Top-level dispatcher: routes each query and always returns an envelope
pub struct SessionCoordinator {
    router: QueryRouter,
    pipeline: PipelineOrchestrator,
    llm: Arc<dyn LanguageModel>,
    memory: Arc<dyn MemoryStore>,
    locks: SessionLocks,
    transcripts: TranscriptStore,
    default_params: QueryParams,
    request_timeout: Duration,
}

impl SessionCoordinator {
    /// Wire every component from configuration
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn VectorStore>,
        documents: Arc<dyn DocumentMetadataCache>,
        memory: Arc<dyn MemoryStore>,
        config: &Config,
    ) -> Self {
        let pipeline = PipelineOrchestrator::new(llm.clone(), store, documents, config);
        Self::from_parts(pipeline, llm, memory, config)
    }

    /// Build around an existing pipeline
    pub fn from_parts(
        pipeline: PipelineOrchestrator,
        llm: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        config: &Config,
    ) -> Self {
        Self {
            router: QueryRouter::new(memory.clone()),
            pipeline,
            llm,
            memory,
            locks: SessionLocks::new(),
            transcripts: TranscriptStore::new(),
            default_params: config.default_params(),
            request_timeout: config.pipeline.request_timeout(),
        }
    }

    pub fn default_params(&self) -> &QueryParams {
        &self.default_params
    }

    pub fn transcripts(&self) -> &TranscriptStore {
        &self.transcripts
    }

    /// Handle a single request under the session's lock
    pub async fn handle(&self, request: QueryRequest) -> ResponseEnvelope {
        let guard = self.locks.acquire(&request.session_id).await;
        let envelope = self.handle_locked(&request).await;
        drop(guard);
        self.locks.prune();
        envelope
    }

    /// Conversational entry point: history comes from the session transcript
    /// and both turns are appended afterwards
    pub async fn chat(&self, session_id: &str, query: &str) -> ResponseEnvelope {
        let guard = self.locks.acquire(session_id).await;

        let request = QueryRequest::new(session_id, query)
            .with_history(self.transcripts.history(session_id))
            .with_params(self.default_params.clone());
        let envelope = self.handle_locked(&request).await;

        self.transcripts
            .append(session_id, ConversationTurn::user(query));
        self.transcripts
            .append(session_id, ConversationTurn::assistant(envelope.answer.clone()));

        drop(guard);
        self.locks.prune();
        envelope
    }

    /// Stream a knowledge-base answer for a session without routing.
    ///
    /// Categorize, retrieve and rerank run under the session lock and the
    /// request deadline, with the session transcript as history. Fragments
    /// are generated after the lock is released; pass the finished answer
    /// to [`Self::record_turn`].
    pub async fn search_stream(
        &self,
        session_id: &str,
        query: &str,
        params: &QueryParams,
    ) -> Result<PipelineStream> {
        let guard = self.locks.acquire(session_id).await;
        let history = self.transcripts.history(session_id);

        let stream = self
            .bounded(async { Ok(self.pipeline.process_stream(query, &history, params).await) })
            .await;

        drop(guard);
        self.locks.prune();
        stream
    }

    /// Append a finished user/assistant exchange to the session transcript
    pub async fn record_turn(&self, session_id: &str, query: &str, answer: impl Into<String>) {
        let _guard = self.locks.acquire(session_id).await;
        self.transcripts
            .append(session_id, ConversationTurn::user(query));
        self.transcripts
            .append(session_id, ConversationTurn::assistant(answer));
    }

    /// Personal facts remembered for a session
    pub async fn facts(&self, session_id: &str) -> Option<PersonalFacts> {
        self.memory.recall(session_id).await
    }

    /// Drop everything remembered about a session
    pub async fn forget(&self, session_id: &str) {
        let _guard = self.locks.acquire(session_id).await;
        self.memory.forget(session_id).await;
        self.transcripts.clear(session_id);
    }

    async fn handle_locked(&self, request: &QueryRequest) -> ResponseEnvelope {
        let started = Instant::now();
        let params = request.params.clone().normalized();

        // Step 1: Route
        let classification = self
            .router
            .classify(&request.query, &request.session_id, &request.history)
            .await;
        let router_response = AgentResponse {
            agent: ROUTER_AGENT.to_string(),
            summary: classification.routing_decision.to_string(),
            confidence: classification.confidence,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            session_id = %request.session_id,
            decision = %classification.routing_decision,
            confidence = classification.confidence,
            "routing query"
        );

        // Step 2: Dispatch
        let mut envelope = self
            .dispatch(request, &classification, &params, router_response)
            .await;
        envelope.processing_time = started.elapsed().as_secs_f64();

        debug!(
            session_id = %request.session_id,
            agents = envelope.total_agents_used,
            confidence = envelope.confidence,
            processing_time = envelope.processing_time,
            "request handled"
        );

        envelope
    }

    async fn dispatch(
        &self,
        request: &QueryRequest,
        classification: &Classification,
        params: &QueryParams,
        router_response: AgentResponse,
    ) -> ResponseEnvelope {
        let decision = classification.routing_decision.as_str();
        let mut agents = vec![router_response];

        let (answer, confidence, sources, metadata) = match &classification.routing_decision {
            RoutingDecision::StoreAndRespond => {
                let (answer, response) = self.store_and_respond(&classification.extracted_info);
                agents.push(response);
                (answer, STORE_CONFIDENCE, Vec::new(), None)
            }
            RoutingDecision::GreetingWithMemory { known_name } => {
                let answer = handlers::greeting(known_name.as_deref());
                agents.push(AgentResponse {
                    agent: GREETING_AGENT.to_string(),
                    summary: match known_name {
                        Some(_) => "personalised greeting".to_string(),
                        None => "greeting".to_string(),
                    },
                    confidence: GREETING_CONFIDENCE,
                    processing_time_ms: 0,
                });
                (answer, GREETING_CONFIDENCE, Vec::new(), None)
            }
            RoutingDecision::KnowledgeBaseSearch => {
                return self.knowledge_path(request, params, agents, decision).await;
            }
            RoutingDecision::ConversationalWithContext if classification.requires_rag => {
                return self.knowledge_path(request, params, agents, decision).await;
            }
            RoutingDecision::ConversationalWithContext => {
                let facts = self
                    .memory
                    .recall(&request.session_id)
                    .await
                    .map(|f| f.describe());
                let (answer, confidence, response) =
                    self.general(request, facts.as_deref(), false).await;
                agents.push(response);
                (answer, confidence, Vec::new(), None)
            }
            RoutingDecision::GeneralKnowledge => {
                let (answer, confidence, response) = self.general(request, None, false).await;
                agents.push(response);
                (answer, confidence, Vec::new(), None)
            }
        };

        let envelope = ResponseEnvelope::new(answer, confidence, sources, agents, decision);
        match metadata {
            Some(metadata) => envelope.with_stage_metadata(metadata),
            None => envelope,
        }
    }

    fn store_and_respond(&self, info: &ExtractedInfo) -> (String, AgentResponse) {
        // The router has already persisted the fields.
        let response = AgentResponse {
            agent: MEMORY_AGENT.to_string(),
            summary: format!(
                "stored {}",
                info.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
            confidence: STORE_CONFIDENCE,
            processing_time_ms: 0,
        };
        (handlers::acknowledgement(info), response)
    }

    /// Pipeline with fallback to the general handler when the backend is
    /// unavailable or the deadline passes
    async fn knowledge_path(
        &self,
        request: &QueryRequest,
        params: &QueryParams,
        mut agents: Vec<AgentResponse>,
        decision: &str,
    ) -> ResponseEnvelope {
        let started = Instant::now();
        let outcome = self
            .bounded(async {
                Ok(self
                    .pipeline
                    .process(&request.query, &request.history, params)
                    .await)
            })
            .await;

        let failure = match outcome {
            Ok(result) if result.retrieval_status() != RetrievalStatus::BackendUnavailable => {
                agents.push(pipeline_response(&result, started));
                let PipelineResult {
                    answer,
                    confidence,
                    sources,
                    stage_metadata,
                } = result;
                return ResponseEnvelope::new(answer, confidence, sources, agents, decision)
                    .with_stage_metadata(stage_metadata);
            }
            Ok(result) => {
                agents.push(pipeline_response(&result, started));
                let failures = result
                    .stage_metadata
                    .stages
                    .iter()
                    .find(|s| s.name == "retrieve")
                    .map(|s| s.result_summary.clone())
                    .unwrap_or_default();
                format!("retrieval backend unavailable: {}", failures)
            }
            Err(e) => e.to_string(),
        };

        warn!(
            session_id = %request.session_id,
            cause = %failure,
            "knowledge base path failed, falling back to general knowledge"
        );

        let (answer, confidence, response) = self.general(request, None, true).await;
        agents.push(response);
        ResponseEnvelope::new(answer, confidence, Vec::new(), agents, decision)
    }

    /// Direct generation with a disclaimer
    async fn general(
        &self,
        request: &QueryRequest,
        memory_context: Option<&str>,
        fallback: bool,
    ) -> (String, f32, AgentResponse) {
        let started = Instant::now();
        let settings = self.pipeline.generation_settings();
        let generation = GenerationRequest::new(handlers::general_prompt(
            &request.query,
            &request.history,
            settings.history_turns,
            memory_context,
        ))
        .with_system_prompt(
            request
                .params
                .prompts
                .system_prompt
                .as_deref()
                .unwrap_or(GENERAL_SYSTEM_PROMPT),
        )
        .with_temperature(settings.temperature)
        .with_max_tokens(settings.max_tokens);

        let (answer, confidence, summary) =
            match self.bounded(self.llm.generate(&generation)).await {
                Ok(answer) => (
                    handlers::with_disclaimer(&answer),
                    GENERAL_CONFIDENCE,
                    "answered".to_string(),
                ),
                Err(e @ RagError::Timeout { .. }) => {
                    warn!(session_id = %request.session_id, error = %e, "general answer timed out");
                    (
                        TIMEOUT_MESSAGE.to_string(),
                        GENERATION_FAILURE_CONFIDENCE,
                        "timed out".to_string(),
                    )
                }
                Err(e) => {
                    warn!(session_id = %request.session_id, error = %e, kind = e.kind(), "general answer failed");
                    (
                        GENERATION_FAILURE_MESSAGE.to_string(),
                        GENERATION_FAILURE_CONFIDENCE,
                        format!("failed: {}", e.kind()),
                    )
                }
            };

        let response = AgentResponse {
            agent: GENERAL_AGENT.to_string(),
            summary: if fallback {
                format!("{} (fallback)", summary)
            } else {
                summary
            },
            confidence,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        (answer, confidence, response)
    }

    /// Bound an external call by the request deadline
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout {
                duration_ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }
}

fn pipeline_response(result: &PipelineResult, started: Instant) -> AgentResponse {
    AgentResponse {
        agent: PIPELINE_AGENT.to_string(),
        summary: format!(
            "{} sources, category {} ({:?})",
            result.sources.len(),
            result.category(),
            result.retrieval_status()
        ),
        confidence: result.confidence,
        processing_time_ms: started.elapsed().as_millis() as u64,
    }
}
