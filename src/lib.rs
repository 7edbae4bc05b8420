// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # plancheck
//!
//! A plan-assertion harness for Terraform configurations.
//!
//! ## Overview
//!
//! plancheck runs `terraform init`, `plan` and `show -json` against a
//! configuration directory with a set of input variables, then checks that
//! the resulting plan contains the expected resource types. It never applies
//! a plan.
//!
//! - Describe scenarios, variables and expectations in a YAML suite file
//! - Expand table-driven cases into independent runs
//! - Plan each run in an isolated workspace, serially or in parallel
//! - Report every missing resource type at once
//!
//! ## Architecture
//!
//! 1. **Backend**: [`terraform::PlanBackend`] plans and renders a configuration
//! 2. **Harness**: [`harness::PlanHarness`] plans once and checks expectations
//! 3. **Runner**: [`runner::SuiteRunner`] drives the harness over a whole suite
//!
//! ## Modules
//!
//! - [`config`]: Suite file parsing, validation and fingerprints
//! - [`terraform`]: Planning backend and provider environment
//! - [`planner`]: Plan requests, plan model and expectations
//! - [`harness`]: Single plan-and-assert operation
//! - [`workspace`]: Isolated run directories
//! - [`runner`]: Suite execution and reports
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! suite:
//!   name: iac-lab
//!
//! environment:
//!   passthrough: [ARM_]
//!
//! scenarios:
//!   - name: network
//!     dir: modules/network
//!     vars:
//!       location: westeurope
//!       address_space: ["10.10.0.0/16"]
//!     expect:
//!       resource_types: [azurerm_virtual_network, azurerm_subnet]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod harness;
pub mod planner;
pub mod runner;
pub mod terraform;
pub mod workspace;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, SuiteConfig};
pub use error::{FailureKind, PlanCheckError, Result};
pub use harness::{EmptyExpectationPolicy, PlanHarness, PlanOutcome};
pub use planner::{Expectations, PlanRequest, PlanResult, ResourceChange};
pub use runner::{ScenarioResult, SuiteReport, SuiteRunner};
pub use terraform::{PlanBackend, ProviderEnvironment, TerraformCli};
pub use workspace::Workspace;
