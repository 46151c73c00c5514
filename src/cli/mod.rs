//! CLI module for ragdesk
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{Args, Commands, QueryOverrides, Verbosity};
