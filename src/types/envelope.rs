//! Response envelope and pipeline observability records

use serde::{Deserialize, Serialize};

use crate::types::retrieval::{Category, RetrievalStatus};

/// Citation for a chunk used in an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub chunk_id: String,
    pub partition: String,
    pub document_id: Option<String>,
    pub title: Option<String>,
    pub page: Option<u32>,
    pub similarity_score: f32,
    pub rerank_score: f32,
    pub excerpt: String,
}

/// Timing and outcome of one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub duration_ms: u64,
    pub result_summary: String,
}

/// Stage-by-stage record of a pipeline run. Never shown to end users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub stages: Vec<StageRecord>,
    pub overall_confidence: f32,
    pub partition_used: Option<String>,
    pub category: Category,
    pub category_confidence: f32,
    pub retrieval_status: RetrievalStatus,
}

/// Contribution of one component to a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent: String,
    pub summary: String,
    pub confidence: f32,
    pub processing_time_ms: u64,
}

/// Uniform envelope returned by every dispatch handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub answer: String,
    pub confidence: f32,
    pub sources: Vec<Source>,
    pub total_agents_used: usize,
    /// Wall-clock seconds for the whole request
    pub processing_time: f64,
    pub agent_responses: Vec<AgentResponse>,
    pub routing_decision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_metadata: Option<PipelineMetadata>,
}

impl ResponseEnvelope {
    /// Build an envelope; `total_agents_used` follows the agent list
    pub fn new(
        answer: String,
        confidence: f32,
        sources: Vec<Source>,
        agent_responses: Vec<AgentResponse>,
        routing_decision: &str,
    ) -> Self {
        Self {
            answer,
            confidence: confidence.clamp(0.0, 1.0),
            sources,
            total_agents_used: agent_responses.len(),
            processing_time: 0.0,
            agent_responses,
            routing_decision: routing_decision.to_string(),
            stage_metadata: None,
        }
    }

    pub fn with_stage_metadata(mut self, metadata: PipelineMetadata) -> Self {
        self.stage_metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_counts_agents() {
        let agents = vec![
            AgentResponse {
                agent: "query_router".into(),
                summary: "greeting".into(),
                confidence: 0.95,
                processing_time_ms: 1,
            },
            AgentResponse {
                agent: "conversation_memory".into(),
                summary: "name on file".into(),
                confidence: 1.0,
                processing_time_ms: 0,
            },
        ];
        let envelope = ResponseEnvelope::new("Hi".into(), 1.4, vec![], agents, "greeting_with_memory");
        assert_eq!(envelope.total_agents_used, 2);
        assert_eq!(envelope.confidence, 1.0);
    }

    #[test]
    fn test_stage_metadata_omitted_when_absent() {
        let envelope = ResponseEnvelope::new("x".into(), 0.7, vec![], vec![], "general_knowledge");
        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("stage_metadata").is_none());
        assert_eq!(json["routing_decision"], "general_knowledge");
    }
}
