//! CLI module for plancheck.
//!
//! This module provides the command-line interface for running plan
//! assertion suites.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
