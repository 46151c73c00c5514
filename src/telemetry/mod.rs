//! Structured logging setup
//!
//! Installs a global `tracing` subscriber. `RUST_LOG` takes precedence over
//! the configured filter; verbosity flags raise the default level.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;

/// Pick the filter directive for a verbosity count (-v, -vv)
pub fn filter_directive(settings: &LoggingSettings, verbose: u8, quiet: bool) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose {
        0 => settings.filter.clone(),
        1 => "ragdesk=debug,info".to_string(),
        _ => "ragdesk=trace,debug".to_string(),
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init(settings: &LoggingSettings, verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(settings, verbose, quiet)));

    let result = if settings.json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
