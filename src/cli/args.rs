//! Command-line argument parsing for ragdesk
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::types::{QueryParams, RerankStrategy};

/// ragdesk - Ask questions against the portfolio-analytics knowledge base
#[derive(Parser, Debug)]
#[command(name = "ragdesk")]
#[command(author = "Jerome (Kubashen) Naidoo")]
#[command(version)]
#[command(about = "Route questions to memory, the document knowledge base or general knowledge", long_about = None)]
pub struct Args {
    /// Configuration file path (~/.ragdesk/config.toml by default)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question and print the response envelope as JSON
    Ask {
        /// The question
        #[arg(value_name = "QUERY")]
        query: String,

        /// Session id (a fresh one is generated when omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// Stream the answer from a knowledge-base search (skips routing)
        #[arg(long)]
        stream: bool,

        #[command(flatten)]
        overrides: QueryOverrides,
    },

    /// Start an interactive chat session
    Chat {
        /// Session id (a fresh one is generated when omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Run system diagnostics and health checks
    Doctor,

    /// Display current configuration
    Config,
}

/// Per-request overrides layered over the configured defaults
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct QueryOverrides {
    /// Reranking strategy: semantic, metadata, financial or hybrid
    #[arg(long)]
    pub strategy: Option<RerankStrategy>,

    /// Chunks requested per partition
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Chunks kept after reranking
    #[arg(long)]
    pub rerank_top_k: Option<usize>,

    /// Minimum vector similarity
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Restrict search to one document type
    #[arg(long)]
    pub doc_type: Option<String>,

    /// Skip retrieval and answer from the model alone
    #[arg(long)]
    pub no_rag: bool,

    /// Replace the default system prompt
    #[arg(long)]
    pub system_prompt: Option<String>,
}

impl QueryOverrides {
    /// Apply the overrides to a set of defaults
    pub fn apply(&self, defaults: &QueryParams) -> QueryParams {
        let mut params = defaults.clone();
        if let Some(strategy) = self.strategy {
            params.strategy = strategy;
        }
        if let Some(top_k) = self.top_k {
            params.top_k = top_k;
        }
        if let Some(rerank_top_k) = self.rerank_top_k {
            params.rerank_top_k = rerank_top_k;
        }
        if let Some(threshold) = self.threshold {
            params.similarity_threshold = threshold;
        }
        if self.doc_type.is_some() {
            params.doc_type = self.doc_type.clone();
        }
        if self.no_rag {
            params.use_rag = false;
        }
        if self.system_prompt.is_some() {
            params.prompts.system_prompt = self.system_prompt.clone();
        }
        params.normalized()
    }
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Show per-stage pipeline records after each answer
    pub fn show_stages(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }

    /// Show the source list after each answer
    pub fn show_sources(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}
