//! Bounded per-session conversation history
//!
//! Each session keeps at most `max_turns` turns, oldest evicted first.

use dashmap::DashMap;
use std::collections::VecDeque;

use crate::types::ConversationTurn;

/// Maximum number of turns kept per session
pub const MAX_TRANSCRIPT_TURNS: usize = 100;

#[derive(Debug)]
pub struct TranscriptStore {
    sessions: DashMap<String, VecDeque<ConversationTurn>>,
    max_turns: usize,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_TRANSCRIPT_TURNS)
    }

    pub fn with_capacity(max_turns: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// Append a turn, evicting the oldest if at capacity
    pub fn append(&self, session_id: &str, turn: ConversationTurn) {
        let mut turns = self.sessions.entry(session_id.to_string()).or_default();
        if turns.len() >= self.max_turns {
            turns.pop_front();
        }
        turns.push_back(turn);
    }

    /// Full history, most-recent-last
    pub fn history(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.sessions
            .get(session_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new()
    }
}
