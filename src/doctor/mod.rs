//! Doctor command for system diagnostics
//!
//! Health checks for the model server, embeddings and every configured
//! retrieval partition.

use colored::*;
use std::sync::Arc;

use crate::config::PartitionSettings;
use crate::llm::LanguageModel;
use crate::vector_store::VectorStore;

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

impl HealthCheck {
    fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Doctor diagnostics system
pub struct Doctor {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn VectorStore>,
    partitions: PartitionSettings,
}

impl Doctor {
    /// Create a new doctor instance
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        store: Arc<dyn VectorStore>,
        partitions: PartitionSettings,
    ) -> Self {
        Self {
            llm,
            store,
            partitions,
        }
    }

    /// Run all health checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        let mut checks = Vec::new();

        checks.push(self.check_model_api().await);
        checks.push(self.check_embeddings().await);

        let store = self.check_vector_store().await;
        let store_reachable = store.status == HealthStatus::Pass;
        checks.push(store);

        if store_reachable {
            for partition in self.partitions.all() {
                checks.push(self.check_partition(&partition).await);
            }
        }

        checks
    }

    /// Check 1: Model server reachable
    async fn check_model_api(&self) -> HealthCheck {
        if self.llm.health_check().await {
            HealthCheck::new("Model API", HealthStatus::Pass)
        } else {
            HealthCheck::new(
                "Model API",
                HealthStatus::Fail("Ollama not running or not reachable".to_string()),
            )
        }
    }

    /// Check 2: Embedding model answers
    async fn check_embeddings(&self) -> HealthCheck {
        match self.llm.embed("health check").await {
            Ok(vector) if !vector.is_empty() => HealthCheck::new("Embeddings", HealthStatus::Pass),
            Ok(_) => HealthCheck::new(
                "Embeddings",
                HealthStatus::Warn("Embedding model returned an empty vector".to_string()),
            ),
            Err(e) => HealthCheck::new("Embeddings", HealthStatus::Fail(e.to_string())),
        }
    }

    /// Check 3: Vector store reachable
    async fn check_vector_store(&self) -> HealthCheck {
        match self.store.partitions().await {
            Ok(_) => HealthCheck::new("Vector Store", HealthStatus::Pass),
            Err(e) => HealthCheck::new("Vector Store", HealthStatus::Fail(e.to_string())),
        }
    }

    /// Check 4..n: each configured partition exists
    async fn check_partition(&self, partition: &str) -> HealthCheck {
        let name = format!("Partition {}", partition);
        match self.store.partition_exists(partition).await {
            Ok(true) => HealthCheck::new(name, HealthStatus::Pass),
            Ok(false) => HealthCheck::new(
                name,
                HealthStatus::Warn("missing; searches will skip it".to_string()),
            ),
            Err(e) => HealthCheck::new(name, HealthStatus::Fail(e.to_string())),
        }
    }

    /// Display diagnostics results
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\n{}\n", "ragdesk System Diagnostics".bold().cyan());
        println!("{:<36} Status", "Check");
        println!("{}", "=".repeat(60));

        for check in checks {
            let status = match &check.status {
                HealthStatus::Pass => "PASS".green(),
                HealthStatus::Warn(msg) => format!("WARN: {}", msg).yellow(),
                HealthStatus::Fail(msg) => format!("FAIL: {}", msg).red(),
            };
            println!("{:<36} {}", check.name, status);
        }

        println!();
    }

    /// Get overall health status
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks.iter().any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}
