//! Session-scoped memory
//!
//! Components:
//! - Conversation Memory: personal facts (name, location, preference) per session
//! - Transcripts: bounded per-session conversation history
//! - Session Locks: per-session-id mutual exclusion for request handling

pub mod conversation;
pub mod locks;
pub mod transcript;

pub use conversation::{ConversationMemory, MemoryStore, PersonalFacts};
pub use locks::SessionLocks;
pub use transcript::TranscriptStore;
