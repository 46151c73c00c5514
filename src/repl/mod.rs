//! Interactive chat REPL
//!
//! Reads questions with rustyline, sends them through the session
//! coordinator under one persistent session id and prints the answer
//! with its sources.

pub mod commands;
pub mod input;

use anyhow::Result;
use colored::*;
use futures_util::StreamExt;
use std::io::Write;
use std::sync::Arc;

use crate::cli::Verbosity;
use crate::coordinator::SessionCoordinator;
use crate::repl::commands::{is_command, Command};
use crate::repl::input::{Input, InputHandler};
use crate::types::{ConversationTurn, ResponseEnvelope, Role, Source, StageRecord};

const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Chat loop bound to one session id
pub struct ChatRepl {
    coordinator: Arc<SessionCoordinator>,
    input: InputHandler,
    session_id: String,
    verbose: bool,
    show_sources: bool,
}

impl ChatRepl {
    pub fn new(
        coordinator: Arc<SessionCoordinator>,
        session_id: String,
        verbosity: Verbosity,
    ) -> Result<Self> {
        let input = match InputHandler::default_history_path() {
            Some(path) => InputHandler::with_history(path)?,
            None => InputHandler::new()?,
        };

        Ok(Self {
            coordinator,
            input,
            session_id,
            verbose: verbosity.show_stages(),
            show_sources: verbosity.show_sources(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Run until /exit or Ctrl-D
    pub async fn run(&mut self) -> Result<()> {
        println!("{}", "ragdesk chat".bold().cyan());
        println!(
            "Session {}. Type {} for commands.\n",
            self.session_id.dimmed(),
            "/help".cyan()
        );

        loop {
            let line = match self.input.read_line()? {
                Input::Line(line) => line,
                Input::Empty => continue,
                Input::Interrupted => {
                    println!("{}", "Use /exit or Ctrl-D to leave.".yellow());
                    continue;
                }
                Input::Eof => break,
            };

            if is_command(&line) {
                if !self.execute(commands::parse(&line)).await? {
                    break;
                }
                continue;
            }

            let envelope = self.coordinator.chat(&self.session_id, &line).await;
            self.print_envelope(&envelope);
        }

        if let Err(e) = self.input.save_history() {
            tracing::warn!(error = %e, "failed to save input history");
        }
        println!("{}", "Goodbye!".green());
        Ok(())
    }

    /// Returns false when the loop should stop
    async fn execute(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Help => commands::show_help(),
            Command::Exit => return Ok(false),
            Command::History { limit } => {
                let history = self.coordinator.transcripts().history(&self.session_id);
                print_history(&history, limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
            }
            Command::Session => {
                println!("  Session: {}", self.session_id.green());
                match self.coordinator.facts(&self.session_id).await {
                    Some(facts) if !facts.is_empty() => {
                        println!("  Remembered: {}", facts.describe().green())
                    }
                    _ => println!("  Remembered: {}", "nothing yet".dimmed()),
                }
            }
            Command::Search { query } => self.search(&query).await?,
            Command::Reset => {
                self.coordinator.forget(&self.session_id).await;
                println!("{}", "Session reset. Facts and history cleared.".yellow());
            }
            Command::Verbose { enable } => {
                self.verbose = enable;
                let status = if enable { "enabled" } else { "disabled" };
                println!("{}", format!("Verbose mode {}", status).cyan());
            }
            Command::Clear => print!("\x1B[2J\x1B[1;1H"),
            Command::Unknown { input } => {
                println!("{}", format!("Unknown command: {}", input).red());
                println!("Type {} for available commands", "/help".cyan());
            }
        }
        Ok(true)
    }

    /// Stream an answer straight from the retrieval pipeline
    async fn search(&mut self, query: &str) -> Result<()> {
        let params = self.coordinator.default_params().clone();

        let mut stream = match self
            .coordinator
            .search_stream(&self.session_id, query, &params)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                println!("{}", format!("Search failed: {}", e).red());
                return Ok(());
            }
        };

        let mut answer = String::new();
        let mut stdout = std::io::stdout();
        println!();
        while let Some(fragment) = stream.fragments.next().await {
            match fragment {
                Ok(text) => {
                    print!("{}", text);
                    stdout.flush()?;
                    answer.push_str(&text);
                }
                Err(e) => {
                    println!("\n{}", format!("Stream interrupted: {}", e).red());
                    break;
                }
            }
        }
        println!("\n");

        self.coordinator
            .record_turn(&self.session_id, query, answer)
            .await;

        print_confidence(stream.confidence);
        if self.show_sources {
            print_sources(&stream.sources);
        }
        if self.verbose {
            print_stages(&stream.stage_metadata.stages);
        }
        Ok(())
    }

    fn print_envelope(&self, envelope: &ResponseEnvelope) {
        println!("\n{}\n", envelope.answer);
        print_confidence(envelope.confidence);
        if self.show_sources {
            print_sources(&envelope.sources);
        }
        if self.verbose {
            println!(
                "  {} {} ({:.2}s)",
                "route:".dimmed(),
                envelope.routing_decision.cyan(),
                envelope.processing_time
            );
            for agent in &envelope.agent_responses {
                println!(
                    "    {:<20} {} ({}ms)",
                    agent.agent.green(),
                    agent.summary,
                    agent.processing_time_ms
                );
            }
            if let Some(metadata) = &envelope.stage_metadata {
                print_stages(&metadata.stages);
            }
        }
        println!();
    }
}

pub fn print_confidence(confidence: f32) {
    let label = format!("confidence {:.2}", confidence);
    let colored = if confidence >= 0.7 {
        label.green()
    } else if confidence >= 0.3 {
        label.yellow()
    } else {
        label.red()
    };
    println!("  {}", colored);
}

pub fn print_sources(sources: &[Source]) {
    if sources.is_empty() {
        return;
    }
    println!("  {}", "Sources:".bold());
    for (i, source) in sources.iter().enumerate() {
        let title = source.title.as_deref().unwrap_or(&source.chunk_id);
        let page = source
            .page
            .map(|p| format!(", p.{}", p))
            .unwrap_or_default();
        println!(
            "    [{}] {}{} {}",
            (i + 1).to_string().cyan(),
            title,
            page,
            format!("({}, {:.2})", source.partition, source.rerank_score).dimmed()
        );
    }
}

fn print_stages(stages: &[StageRecord]) {
    for stage in stages {
        println!(
            "    {:<10} {:>6}ms  {}",
            stage.name.cyan(),
            stage.duration_ms,
            stage.result_summary.dimmed()
        );
    }
}

fn print_history(history: &[ConversationTurn], limit: usize) {
    if history.is_empty() {
        println!("{}", "No conversation yet.".yellow());
        return;
    }
    let start = history.len().saturating_sub(limit);
    for turn in &history[start..] {
        let speaker = match turn.role {
            Role::User => "you".green(),
            Role::Assistant => "ragdesk".cyan(),
        };
        println!("  {:>8}: {}", speaker, turn.content);
    }
}
