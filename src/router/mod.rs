//! Deterministic rule-based query routing
//!
//! No external calls are made while classifying, so classification always
//! terminates with exactly one decision.

pub mod router;
pub mod rules;

pub use router::QueryRouter;
pub use rules::{default_rules, KnowledgeSignal, RuleOutcome, RuleSet};
