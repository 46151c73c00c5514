//! Ollama HTTP client
//!
//! Endpoints:
//! - POST /api/embeddings (query embeddings)
//! - POST /api/generate (streaming and non-streaming generation)
//! - GET /api/version (health)

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::OllamaSettings;
use crate::errors::{RagError, Result};
use crate::llm::stream::NdjsonDecoder;
use crate::llm::{FragmentStream, GenerationRequest, LanguageModel};

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model
pub const DEFAULT_MODEL: &str = "qwen2.5:7b-instruct";

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Request timeout (30 seconds)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Ollama client implementing `LanguageModel`
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    embedding_model: String,
}

impl OllamaClient {
    /// Create new Ollama client with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_OLLAMA_URL, DEFAULT_MODEL, DEFAULT_EMBEDDING_MODEL, REQUEST_TIMEOUT)
    }

    /// Create client from the `[ollama]` config section
    pub fn from_settings(settings: &OllamaSettings) -> Result<Self> {
        Self::with_config(
            &settings.url,
            &settings.model,
            &settings.embedding_model,
            Duration::from_secs(settings.timeout_secs.max(1)),
        )
    }

    /// Create Ollama client with custom configuration
    pub fn with_config(
        base_url: &str,
        model: &str,
        embedding_model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            embedding_model: embedding_model.to_string(),
        })
    }

    fn generate_body(&self, request: &GenerationRequest, stream: bool) -> OllamaGenerateRequest {
        OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: request.prompt.clone(),
            system: request.system_prompt.clone(),
            stream,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    async fn post_generate(&self, body: &OllamaGenerateRequest) -> Result<reqwest::Response> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| RagError::Generation(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Generation(format!("HTTP {}: {}", status, error_text)));
        }

        Ok(response)
    }

    /// Get current model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get embedding model name
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.embedding_model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::Embedding(format!("HTTP {}", response.status())));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to parse embedding: {}", e)))?;

        if body.embedding.is_empty() {
            return Err(RagError::Embedding("empty embedding returned".to_string()));
        }

        Ok(body.embedding)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let response = self.post_generate(&self.generate_body(request, false)).await?;

        let body: GenerateChunk = response
            .json()
            .await
            .map_err(|e| RagError::Generation(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = body.error {
            return Err(RagError::Generation(error));
        }

        Ok(body.response)
    }

    async fn generate_stream(&self, request: &GenerationRequest) -> Result<FragmentStream> {
        let response = self.post_generate(&self.generate_body(request, true)).await?;

        let mut decoder = NdjsonDecoder::new();
        let fragments = response
            .bytes_stream()
            .map(move |chunk| -> Result<Vec<String>> {
                let bytes = chunk.map_err(|e| RagError::Generation(e.to_string()))?;
                let frames: Vec<GenerateChunk> = decoder.push(&bytes)?;
                frames
                    .into_iter()
                    .filter_map(|frame| match frame.error {
                        Some(error) => Some(Err(RagError::Generation(error))),
                        None if frame.response.is_empty() => None,
                        None => Some(Ok(frame.response)),
                    })
                    .collect()
            })
            .flat_map(|batch| match batch {
                Ok(items) => stream::iter(items.into_iter().map(Ok).collect::<Vec<_>>()),
                Err(e) => stream::iter(vec![Err(e)]),
            });

        Ok(fragments.boxed())
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Ollama generate request
#[derive(Debug, Clone, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

/// One generate response object (whole body or one stream line)
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}
