//! Planning tool integration.
//!
//! This module provides the [`PlanBackend`] abstraction, the Terraform CLI
//! implementation of it, and the provider environment handed to the tool.

mod backend;
mod cli;
mod environment;

pub use backend::PlanBackend;
pub use cli::{DEFAULT_BINARY, TerraformCli};
pub use environment::ProviderEnvironment;
