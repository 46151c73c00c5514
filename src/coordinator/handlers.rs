//! Response text for the handlers that answer without retrieval

use crate::memory::conversation::{FIELD_LOCATION, FIELD_NAME, FIELD_PREFERENCE};
use crate::rag::pipeline::format_history;
use crate::types::{ConversationTurn, ExtractedInfo};

/// Agent labels reported in `agent_responses`
pub const ROUTER_AGENT: &str = "query_router";
pub const MEMORY_AGENT: &str = "conversation_memory";
pub const GREETING_AGENT: &str = "greeting";
pub const PIPELINE_AGENT: &str = "rag_pipeline";
pub const GENERAL_AGENT: &str = "general_knowledge";

pub const STORE_CONFIDENCE: f32 = 0.95;
pub const GREETING_CONFIDENCE: f32 = 0.9;
pub const GENERAL_CONFIDENCE: f32 = 0.7;

pub const GENERAL_DISCLAIMER: &str = "Note: this answer comes from general knowledge, not \
from documents in the knowledge base.";

pub const GENERAL_SYSTEM_PROMPT: &str = "You are a helpful assistant for an investment \
analytics team. Answer clearly and briefly. If a question needs firm-specific data you do \
not have, say so instead of guessing.";

pub const TIMEOUT_MESSAGE: &str = "Sorry, that took longer than expected. Please try again.";

/// Acknowledge freshly stored personal facts
pub fn acknowledgement(info: &ExtractedInfo) -> String {
    let mut facts = Vec::new();
    if let Some(location) = info.get(FIELD_LOCATION) {
        facts.push(format!("you're based in {}", location));
    }
    if let Some(preference) = info.get(FIELD_PREFERENCE) {
        facts.push(format!("you prefer {}", preference));
    }

    let opener = match info.get(FIELD_NAME) {
        Some(name) => format!("Nice to meet you, {}!", name),
        None => "Thanks for letting me know!".to_string(),
    };

    if facts.is_empty() {
        format!("{} How can I help you today?", opener)
    } else {
        format!(
            "{} I'll remember that {}. How can I help you today?",
            opener,
            facts.join(" and ")
        )
    }
}

/// Greeting, personalised when a name is on file
pub fn greeting(known_name: Option<&str>) -> String {
    match known_name {
        Some(name) => format!("Hello again, {}! What would you like to look at today?", name),
        None => "Hello! I can help with attribution, AUM and technical questions, or anything \
else on your mind. What would you like to know?"
            .to_string(),
    }
}

/// Prompt for a direct model answer, optionally with remembered facts
pub fn general_prompt(
    query: &str,
    history: &[ConversationTurn],
    history_turns: usize,
    memory_context: Option<&str>,
) -> String {
    let mut prompt = format_history(history, history_turns);
    if let Some(facts) = memory_context.filter(|f| !f.is_empty()) {
        prompt.push_str("What you know about the user: ");
        prompt.push_str(facts);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Question: ");
    prompt.push_str(query);
    prompt
}

pub fn with_disclaimer(answer: &str) -> String {
    format!("{}\n\n{}", answer.trim(), GENERAL_DISCLAIMER)
}
