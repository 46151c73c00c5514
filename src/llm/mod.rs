//! Embedding and text-generation capability
//!
//! The pipeline only sees the `LanguageModel` trait; `OllamaClient` is the
//! production backend.

pub mod client;
pub mod stream;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

pub use client::{OllamaClient, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
pub use stream::{NdjsonDecoder, MAX_LINE_BYTES};

/// Stream of generated text fragments (finite, forward-only)
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Parameters of a single generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            temperature: 0.3,
            max_tokens: 1024,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Opaque embedding/generation service
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Embed text into a dense vector
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate a complete response
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Generate a response as a stream of fragments
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<FragmentStream>;

    /// Whether the service is reachable
    async fn health_check(&self) -> bool {
        true
    }
}
