use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::{Category, QueryParams, RerankStrategy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaSettings,
    #[serde(default)]
    pub qdrant: QdrantSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub partitions: PartitionSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaSettings {
    pub url: String,
    pub model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantSettings {
    pub url: String,
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
        }
    }
}

/// Request defaults when the caller does not override them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub rerank_top_k: usize,
    pub similarity_threshold: f32,
    pub strategy: RerankStrategy,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 10,
            rerank_top_k: 5,
            similarity_threshold: 0.3,
            strategy: RerankStrategy::Hybrid,
        }
    }
}

/// Category to partition table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionSettings {
    pub attribution: String,
    pub technical: String,
    pub aum: String,
    pub general: String,
    /// Probed after the category partition
    pub default: String,
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self {
            attribution: "attribution_reports".to_string(),
            technical: "technical_docs".to_string(),
            aum: "aum_reports".to_string(),
            general: "general_documents".to_string(),
            default: "documents".to_string(),
        }
    }
}

impl PartitionSettings {
    pub fn for_category(&self, category: Category) -> &str {
        match category {
            Category::Attribution => &self.attribution,
            Category::Technical => &self.technical,
            Category::Aum => &self.aum,
            Category::General => &self.general,
        }
    }

    /// Every configured partition, default last, without duplicates
    pub fn all(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in [
            &self.attribution,
            &self.technical,
            &self.aum,
            &self.general,
            &self.default,
        ] {
            if !names.iter().any(|n| n == name) {
                names.push(name.clone());
            }
        }
        names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Whole-request deadline enforced by the coordinator
    pub request_timeout_secs: u64,
    /// History turns included in generation prompts
    pub history_turns: usize,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Token budget for the context block
    pub max_context_tokens: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            history_turns: 6,
            temperature: 0.3,
            max_tokens: 1024,
            max_context_tokens: 3000,
        }
    }
}

impl PipelineSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".ragdesk").join("config.toml"))
    }

    /// Request parameters seeded from the retrieval defaults
    pub fn default_params(&self) -> QueryParams {
        QueryParams {
            top_k: self.retrieval.top_k,
            rerank_top_k: self.retrieval.rerank_top_k,
            similarity_threshold: self.retrieval.similarity_threshold,
            strategy: self.retrieval.strategy,
            ..QueryParams::default()
        }
        .normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.retrieval.top_k, 10);
        assert_eq!(config.retrieval.rerank_top_k, 5);
        assert_eq!(config.partitions.for_category(Category::Attribution), "attribution_reports");
    }

    #[test]
    fn test_partitions_all_dedups() {
        let partitions = PartitionSettings {
            general: "documents".to_string(),
            ..Default::default()
        };
        let all = partitions.all();
        assert_eq!(all.len(), 4);
        assert_eq!(all.last().map(String::as_str), Some("documents"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [retrieval]
            top_k = 4
            strategy = "financial"

            [partitions]
            attribution = "attr"
            "#,
        )
        .unwrap();
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.retrieval.rerank_top_k, 5);
        assert_eq!(config.retrieval.strategy, RerankStrategy::Financial);
        assert_eq!(config.partitions.attribution, "attr");
        assert_eq!(config.partitions.default, "documents");
        assert_eq!(config.ollama.model, "qwen2.5:7b-instruct");

        // rerank_top_k is clamped to top_k
        let params = config.default_params();
        assert_eq!(params.rerank_top_k, 4);
    }

    #[test]
    fn test_config_roundtrip_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.ollama.model = "llama3.1:8b".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.ollama.model, "llama3.1:8b");
        assert_eq!(loaded.pipeline.history_turns, 6);
    }
}
