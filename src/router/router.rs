use std::sync::Arc;
use tracing::debug;

use crate::memory::MemoryStore;
use crate::router::rules::{default_rules, RuleOutcome, RuleSet};
use crate::types::{Classification, ConversationTurn};

/// Confidence assigned to conversational follow-ups
const FOLLOW_UP_CONFIDENCE: f32 = 0.8;

/// Rule-based classifier producing one routing decision per query
pub struct QueryRouter {
    memory: Arc<dyn MemoryStore>,
    rules: &'static RuleSet,
}

impl QueryRouter {
    /// Create router over the built-in rule table
    pub fn new(memory: Arc<dyn MemoryStore>) -> Self {
        Self {
            memory,
            rules: default_rules(),
        }
    }

    /// Classify a query.
    ///
    /// Personal facts found in the query are persisted to conversation
    /// memory before returning; greetings pick up a stored name.
    pub async fn classify(
        &self,
        query: &str,
        session_id: &str,
        history: &[ConversationTurn],
    ) -> Classification {
        let classification = match self.rules.evaluate(query, history) {
            RuleOutcome::PersonalInfo(info) => {
                self.memory.remember(session_id, &info).await;
                Classification::personal_info(info)
            }
            RuleOutcome::Greeting => {
                let known_name = self
                    .memory
                    .recall(session_id)
                    .await
                    .and_then(|facts| facts.name);
                Classification::greeting(known_name)
            }
            RuleOutcome::FollowUp { requires_rag } => {
                Classification::conversational(FOLLOW_UP_CONFIDENCE, requires_rag)
            }
            RuleOutcome::KnowledgeBase(signal) => Classification::knowledge_base(signal.confidence()),
            RuleOutcome::General => Classification::general_knowledge(),
        };

        debug!(
            session_id,
            decision = %classification.routing_decision,
            confidence = classification.confidence,
            requires_rag = classification.requires_rag,
            "query classified"
        );

        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ConversationMemory;
    use crate::types::{ClassificationType, RoutingDecision};

    fn router() -> (QueryRouter, Arc<ConversationMemory>) {
        let memory = Arc::new(ConversationMemory::new());
        (QueryRouter::new(memory.clone()), memory)
    }

    #[tokio::test]
    async fn test_personal_info_is_persisted() {
        let (router, memory) = router();
        let c = router.classify("Hi, I'm Sarah", "S1", &[]).await;

        assert_eq!(c.kind, ClassificationType::PersonalInfo);
        assert_eq!(c.routing_decision, RoutingDecision::StoreAndRespond);
        assert_eq!(c.confidence, 0.9);
        assert_eq!(c.extracted_info.get("name").map(String::as_str), Some("Sarah"));

        let facts = memory.recall("S1").await.unwrap();
        assert_eq!(facts.name.as_deref(), Some("Sarah"));
    }

    #[tokio::test]
    async fn test_greeting_carries_known_name() {
        let (router, _memory) = router();
        router.classify("Hi, I'm Sarah", "S1", &[]).await;

        let c = router.classify("Hello again!", "S1", &[]).await;
        assert_eq!(c.kind, ClassificationType::Greeting);
        assert_eq!(c.confidence, 0.95);
        assert_eq!(
            c.routing_decision,
            RoutingDecision::GreetingWithMemory {
                known_name: Some("Sarah".to_string())
            }
        );

        let other = router.classify("Hello again!", "S2", &[]).await;
        assert_eq!(
            other.routing_decision,
            RoutingDecision::GreetingWithMemory { known_name: None }
        );
    }

    #[tokio::test]
    async fn test_knowledge_base_confidence_tiers() {
        let (router, _) = router();
        let explicit = router
            .classify("What are the top 3 detractors this quarter?", "S1", &[])
            .await;
        assert_eq!(explicit.routing_decision, RoutingDecision::KnowledgeBaseSearch);
        assert_eq!(explicit.confidence, 0.9);
        assert!(explicit.requires_rag);

        let domain = router.classify("How is the fund positioned?", "S1", &[]).await;
        assert_eq!(domain.confidence, 0.8);

        let performance = router.classify("Why did we underperform?", "S1", &[]).await;
        assert_eq!(performance.confidence, 0.7);
    }

    #[tokio::test]
    async fn test_conversational_and_default() {
        let (router, _) = router();
        let history = vec![
            ConversationTurn::user("How did the portfolio perform?"),
            ConversationTurn::assistant("According to the factsheet it returned 4%."),
        ];
        let c = router.classify("what about last year?", "S1", &history).await;
        assert_eq!(c.routing_decision, RoutingDecision::ConversationalWithContext);
        assert!(c.requires_rag);

        let general = router.classify("Write a limerick", "S1", &[]).await;
        assert_eq!(general.kind, ClassificationType::GeneralKnowledge);
        assert_eq!(general.confidence, 0.5);
        assert!(!general.requires_rag);
    }
}
