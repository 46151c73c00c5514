//! Routing classification types
//!
//! A `Classification` is produced exactly once per query by the router and
//! never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fields extracted from a query (name, location, preference)
pub type ExtractedInfo = BTreeMap<String, String>;

/// Query type assigned by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationType {
    PersonalInfo,
    Greeting,
    KnowledgeBase,
    Conversational,
    GeneralKnowledge,
}

/// Handler selected for a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Persist extracted personal facts and acknowledge them
    StoreAndRespond,
    /// Greet the user, personalised with a stored name when available
    GreetingWithMemory { known_name: Option<String> },
    /// Run the retrieval pipeline
    KnowledgeBaseSearch,
    /// Follow-up on the running conversation
    ConversationalWithContext,
    /// Answer directly from the model
    GeneralKnowledge,
}

impl RoutingDecision {
    /// Stable label for logs and envelopes
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingDecision::StoreAndRespond => "store_and_respond",
            RoutingDecision::GreetingWithMemory { .. } => "greeting_with_memory",
            RoutingDecision::KnowledgeBaseSearch => "knowledge_base_search",
            RoutingDecision::ConversationalWithContext => "conversational_with_context",
            RoutingDecision::GeneralKnowledge => "general_knowledge",
        }
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Router output for a single query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "type")]
    pub kind: ClassificationType,
    /// Confidence in [0, 1]
    pub confidence: f32,
    pub routing_decision: RoutingDecision,
    pub requires_rag: bool,
    pub requires_memory: bool,
    pub extracted_info: ExtractedInfo,
}

impl Classification {
    pub fn personal_info(extracted_info: ExtractedInfo) -> Self {
        Self {
            kind: ClassificationType::PersonalInfo,
            confidence: 0.9,
            routing_decision: RoutingDecision::StoreAndRespond,
            requires_rag: false,
            requires_memory: true,
            extracted_info,
        }
    }

    pub fn greeting(known_name: Option<String>) -> Self {
        Self {
            kind: ClassificationType::Greeting,
            confidence: 0.95,
            routing_decision: RoutingDecision::GreetingWithMemory { known_name },
            requires_rag: false,
            requires_memory: true,
            extracted_info: ExtractedInfo::new(),
        }
    }

    pub fn conversational(confidence: f32, requires_rag: bool) -> Self {
        Self {
            kind: ClassificationType::Conversational,
            confidence,
            routing_decision: RoutingDecision::ConversationalWithContext,
            requires_rag,
            requires_memory: true,
            extracted_info: ExtractedInfo::new(),
        }
    }

    pub fn knowledge_base(confidence: f32) -> Self {
        Self {
            kind: ClassificationType::KnowledgeBase,
            confidence,
            routing_decision: RoutingDecision::KnowledgeBaseSearch,
            requires_rag: true,
            requires_memory: false,
            extracted_info: ExtractedInfo::new(),
        }
    }

    pub fn general_knowledge() -> Self {
        Self {
            kind: ClassificationType::GeneralKnowledge,
            confidence: 0.5,
            routing_decision: RoutingDecision::GeneralKnowledge,
            requires_rag: false,
            requires_memory: false,
            extracted_info: ExtractedInfo::new(),
        }
    }
}

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of conversation history (ordered most-recent-last)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
