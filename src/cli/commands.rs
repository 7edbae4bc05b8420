//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// plancheck - Assert the resource types a Terraform plan would create.
#[derive(Parser, Debug)]
#[command(name = "plancheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the suite file.
    #[arg(short, long, global = true, env = "PLANCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new suite.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the suite file.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// List the runs the suite expands to.
    List,

    /// Plan every scenario and check its expectations.
    Run {
        /// Only run the named scenarios (repeatable).
        #[arg(short, long = "scenario")]
        scenarios: Vec<String>,

        /// Maximum number of parallel runs.
        #[arg(short, long)]
        parallelism: Option<usize>,

        /// Skip remaining runs after the first failure.
        #[arg(long)]
        fail_fast: bool,

        /// Keep run workspaces for inspection.
        #[arg(long)]
        keep_workspaces: bool,

        /// Write a JSON report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check an already rendered plan (`terraform show -json` output).
    Check {
        /// Path to the plan JSON document.
        plan_json: PathBuf,

        /// Expected resource type (repeatable).
        #[arg(short, long = "expect")]
        expect: Vec<String>,

        /// Minimum number of resource changes.
        #[arg(long)]
        min_changes: Option<usize>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
