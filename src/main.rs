//! ragdesk - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use futures_util::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

use ragdesk::{
    cli::{Args, Commands, QueryOverrides},
    config::Config,
    coordinator::{QueryRequest, SessionCoordinator},
    doctor::Doctor,
    llm::{LanguageModel, OllamaClient},
    memory::ConversationMemory,
    repl::{self, ChatRepl},
    telemetry,
    vector_store::{InMemoryDocumentCache, QdrantStore, VectorStore},
};

/// Shared backends built from configuration
struct Backends {
    llm: Arc<dyn LanguageModel>,
    store: Arc<dyn VectorStore>,
}

impl Backends {
    fn connect(config: &Config) -> Result<Self> {
        let llm = OllamaClient::from_settings(&config.ollama)
            .context("Failed to create Ollama client")?;
        let store = QdrantStore::new(&config.qdrant).context("Failed to create Qdrant client")?;

        Ok(Self {
            llm: Arc::new(llm),
            store: Arc::new(store),
        })
    }

    fn coordinator(&self, config: &Config) -> SessionCoordinator {
        SessionCoordinator::new(
            self.llm.clone(),
            self.store.clone(),
            Arc::new(InMemoryDocumentCache::new()),
            Arc::new(ConversationMemory::new()),
            config,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    telemetry::init(&config.logging, args.verbose, args.quiet);

    match &args.command {
        Commands::Ask {
            query,
            session,
            stream,
            overrides,
        } => {
            let session_id = session.clone().unwrap_or_else(new_session_id);
            if *stream {
                run_ask_stream(&config, &session_id, query, overrides).await
            } else {
                run_ask(&config, &session_id, query, overrides).await
            }
        }
        Commands::Chat { session } => {
            let session_id = session.clone().unwrap_or_else(new_session_id);
            run_chat(&args, &config, session_id).await
        }
        Commands::Doctor => run_doctor(&config).await,
        Commands::Config => show_config(&args, &config),
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

async fn run_ask(
    config: &Config,
    session_id: &str,
    query: &str,
    overrides: &QueryOverrides,
) -> Result<()> {
    let backends = Backends::connect(config)?;
    let coordinator = backends.coordinator(config);

    let params = overrides.apply(coordinator.default_params());
    let request = QueryRequest::new(session_id, query).with_params(params);

    info!(session_id = %session_id, "answering single query");
    let envelope = coordinator.handle(request).await;

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

/// Knowledge-base search with a streamed answer; routing is skipped
async fn run_ask_stream(
    config: &Config,
    session_id: &str,
    query: &str,
    overrides: &QueryOverrides,
) -> Result<()> {
    let backends = Backends::connect(config)?;
    let coordinator = backends.coordinator(config);
    let params = overrides.apply(coordinator.default_params());

    info!(session_id = %session_id, "streaming knowledge-base answer");
    let mut stream = coordinator.search_stream(session_id, query, &params).await?;

    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.fragments.next().await {
        let text = fragment?;
        print!("{}", text);
        stdout.flush()?;
    }
    println!("\n");

    repl::print_confidence(stream.confidence);
    repl::print_sources(&stream.sources);
    Ok(())
}

async fn run_chat(args: &Args, config: &Config, session_id: String) -> Result<()> {
    let backends = Backends::connect(config)?;

    if !backends.llm.health_check().await {
        eprintln!(
            "{}",
            format!("Ollama is not reachable at {}. Start it with: ollama serve", config.ollama.url)
                .red()
        );
        std::process::exit(1);
    }

    let coordinator = Arc::new(backends.coordinator(config));
    let mut chat = ChatRepl::new(coordinator, session_id, args.verbosity())?;
    chat.run().await
}

async fn run_doctor(config: &Config) -> Result<()> {
    let backends = Backends::connect(config)?;
    let doctor = Doctor::new(backends.llm, backends.store, config.partitions.clone());

    let checks = doctor.run_diagnostics().await;
    Doctor::display_results(&checks);

    let healthy = Doctor::overall_status(&checks);
    if healthy {
        println!("{}", "All checks passed".green());
    } else {
        println!("{}", "Some checks failed".red());
    }

    std::process::exit(if healthy { 0 } else { 1 });
}

fn show_config(args: &Args, config: &Config) -> Result<()> {
    let location = match &args.config {
        Some(path) => path.display().to_string(),
        None => Config::config_path()?.display().to_string(),
    };

    println!("{} {}\n", "# Configuration:".bold(), location.dimmed());
    println!(
        "{}",
        toml::to_string_pretty(config).context("Failed to serialize config")?
    );
    Ok(())
}
