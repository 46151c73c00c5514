//! Built-in slash commands for the chat REPL

use colored::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    History { limit: Option<usize> },
    Session,
    /// Ask the retrieval pipeline directly and stream the answer
    Search { query: String },
    Reset,
    Verbose { enable: bool },
    Clear,
    Exit,
    Unknown { input: String },
}

/// Whether the input is a slash command rather than a question
pub fn is_command(input: &str) -> bool {
    input.trim().starts_with('/')
}

/// Parse a slash command
pub fn parse(input: &str) -> Command {
    let trimmed = input.trim();
    let Some(body) = trimmed.strip_prefix('/') else {
        return Command::Unknown {
            input: input.to_string(),
        };
    };

    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    match name.to_lowercase().as_str() {
        "help" | "h" => Command::Help,
        "exit" | "quit" | "q" => Command::Exit,
        "history" => Command::History {
            limit: rest.parse().ok(),
        },
        "session" => Command::Session,
        "search" | "kb" if !rest.is_empty() => Command::Search {
            query: rest.to_string(),
        },
        "reset" => Command::Reset,
        "verbose" => Command::Verbose {
            enable: rest.is_empty()
                || matches!(rest.to_lowercase().as_str(), "on" | "1" | "true"),
        },
        "clear" | "cls" => Command::Clear,
        _ => Command::Unknown {
            input: input.to_string(),
        },
    }
}

pub fn show_help() {
    println!("\n{}", "Available Commands:".bold().cyan());
    println!("{}", "=".repeat(60).cyan());

    let commands = [
        ("/help, /h", "Show this help message"),
        ("/history [n]", "Show the last n turns (default: 10)"),
        ("/session", "Show the session id and remembered facts"),
        ("/search <question>", "Search the knowledge base and stream the answer"),
        ("/reset", "Forget this session's facts and history"),
        ("/verbose [on|off]", "Toggle stage and source output"),
        ("/clear, /cls", "Clear screen"),
        ("/exit, /quit, /q", "Exit"),
    ];

    for (cmd, desc) in commands {
        println!("  {:<22} {}", cmd.green(), desc);
    }

    println!("\n{}", "Usage:".bold());
    println!("  - Type your question directly (no / prefix)");
    println!("  - Use {} for input history", "UP/DOWN arrows".cyan());
    println!("  - Press {} or {} to exit", "Ctrl-D".cyan(), "/exit".cyan());
    println!();
}
