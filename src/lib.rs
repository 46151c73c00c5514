//! ragdesk - Query routing and retrieval-augmented answering
//!
//! Routes each user query to memory, the document knowledge base or
//! general knowledge, and answers knowledge-base questions through a
//! categorize → retrieve → rerank → generate pipeline over partitioned
//! vector storage.
//!
//! # Architecture
//!
//! - **router**: rule-based classification into a routing decision
//! - **rag**: categorizer, multi-partition retriever, rerankers and the
//!   pipeline orchestrator
//! - **coordinator**: per-session dispatch with fallback and deadlines
//! - **memory**: per-session personal facts, transcripts and locks

pub mod errors;
pub mod types;

// Re-export commonly used types
pub use errors::{RagError, Result};

// Backends
pub mod llm;
pub mod vector_store;

// Query handling
pub mod coordinator;
pub mod memory;
pub mod rag;
pub mod router;

// Interface layer
pub mod cli;
pub mod config;
pub mod doctor;
pub mod repl;
pub mod telemetry;
