//! CLI module.
//!
//! This module implements the command-line interface, including command
//! definitions and output formatting.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
