//! Per-session store of extracted personal facts
//!
//! Entries are created on the first extraction for a session, merged on
//! later extractions and never expired here; expiry belongs to whoever owns
//! the session lifecycle.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::types::ExtractedInfo;

pub const FIELD_NAME: &str = "name";
pub const FIELD_LOCATION: &str = "location";
pub const FIELD_PREFERENCE: &str = "preference";

/// Facts remembered about the person behind a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalFacts {
    pub name: Option<String>,
    pub location: Option<String>,
    pub preference: Option<String>,
}

impl PersonalFacts {
    /// Overwrite fields present in `info`; absent fields keep their value
    pub fn merge(&mut self, info: &ExtractedInfo) {
        if let Some(name) = info.get(FIELD_NAME) {
            self.name = Some(name.clone());
        }
        if let Some(location) = info.get(FIELD_LOCATION) {
            self.location = Some(location.clone());
        }
        if let Some(preference) = info.get(FIELD_PREFERENCE) {
            self.preference = Some(preference.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.location.is_none() && self.preference.is_none()
    }

    /// One-line summary for prompt injection, e.g. "name: Sarah; location: Leeds"
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(format!("name: {}", name));
        }
        if let Some(location) = &self.location {
            parts.push(format!("location: {}", location));
        }
        if let Some(preference) = &self.preference {
            parts.push(format!("preference: {}", preference));
        }
        parts.join("; ")
    }
}

/// Storage capability for personal facts, keyed by session id
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Facts on file for a session
    async fn recall(&self, session_id: &str) -> Option<PersonalFacts>;

    /// Merge extracted fields into the session's entry, creating it if needed
    async fn remember(&self, session_id: &str, info: &ExtractedInfo) -> PersonalFacts;

    /// Drop a session's entry. Returns whether one existed.
    async fn forget(&self, session_id: &str) -> bool;
}

/// In-memory conversation memory
#[derive(Debug, Default)]
pub struct ConversationMemory {
    entries: DashMap<String, PersonalFacts>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with stored facts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl MemoryStore for ConversationMemory {
    async fn recall(&self, session_id: &str) -> Option<PersonalFacts> {
        self.entries.get(session_id).map(|entry| entry.value().clone())
    }

    async fn remember(&self, session_id: &str, info: &ExtractedInfo) -> PersonalFacts {
        // The entry guard holds the shard lock, so concurrent merges on the
        // same session cannot interleave.
        let mut entry = self.entries.entry(session_id.to_string()).or_default();
        entry.merge(info);
        entry.value().clone()
    }

    async fn forget(&self, session_id: &str) -> bool {
        self.entries.remove(session_id).is_some()
    }
}
