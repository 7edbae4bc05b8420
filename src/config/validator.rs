//! Suite validation.
//!
//! This module checks a parsed suite for problems that would otherwise only
//! surface midway through a run: duplicate names, colliding plan files,
//! missing directories, and meaningless expectations.

use crate::error::{ConfigError, PlanCheckError, Result};
use crate::harness::EmptyExpectationPolicy;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::spec::{DefaultsConfig, ScenarioConfig, SuiteConfig};

/// Validator for suite files.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Suite root used to check that scenario directories exist.
    root: Option<PathBuf>,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a validator that only checks the suite's structure.
    #[must_use]
    pub const fn new() -> Self {
        Self { root: None }
    }

    /// Also checks that scenario directories exist under `root`.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Validates a suite.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, config: &SuiteConfig) -> Result<ValidationResult> {
        let mut result = self.collect(config);

        if result.errors.is_empty() {
            debug!("Suite validation passed");
            Ok(result)
        } else {
            let first_error = result.errors.remove(0);
            Err(PlanCheckError::Config(ConfigError::ValidationError {
                message: first_error.message,
                field: Some(first_error.field),
            }))
        }
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn collect(&self, config: &SuiteConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_suite(config, &mut result);
        Self::validate_defaults(&config.defaults, &mut result);
        for (i, scenario) in config.scenarios.iter().enumerate() {
            self.validate_scenario(i, scenario, config.defaults.empty_expectations, &mut result);
        }
        Self::validate_unique_names(&config.scenarios, &mut result);
        Self::validate_plan_files(config, &mut result);
        if !config.defaults.isolate_workspaces {
            Self::validate_in_place_dirs(config, &mut result);
        }

        result
    }

    /// Validates suite-level settings.
    fn validate_suite(config: &SuiteConfig, result: &mut ValidationResult) {
        if config.suite.name.is_empty() {
            result.error("suite.name", "Suite name cannot be empty");
        } else if !is_valid_name(&config.suite.name) {
            result.error(
                "suite.name",
                format!(
                    "Suite name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    config.suite.name
                ),
            );
        }

        if config.terraform.binary.trim().is_empty() {
            result.error("terraform.binary", "Planning tool binary cannot be empty");
        }

        if config.scenarios.is_empty() {
            result.warnings.push(String::from("Suite has no scenarios"));
        }
    }

    /// Validates defaults.
    fn validate_defaults(defaults: &DefaultsConfig, result: &mut ValidationResult) {
        if defaults.parallelism == 0 {
            result.error("defaults.parallelism", "Parallelism must be at least 1");
        }
    }

    /// Validates a single scenario.
    fn validate_scenario(
        &self,
        index: usize,
        scenario: &ScenarioConfig,
        policy: EmptyExpectationPolicy,
        result: &mut ValidationResult,
    ) {
        let prefix = format!("scenarios[{index}]");

        if !is_valid_name(&scenario.name) {
            result.error(
                format!("{prefix}.name"),
                format!(
                    "Scenario name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    scenario.name
                ),
            );
        }

        if scenario.dir.is_absolute() {
            result.error(
                format!("{prefix}.dir"),
                format!(
                    "Scenario '{}' directory must be relative to the suite root",
                    scenario.name
                ),
            );
        } else if let Some(root) = &self.root
            && !root.join(&scenario.dir).is_dir()
        {
            result.error(
                format!("{prefix}.dir"),
                format!(
                    "Scenario '{}' directory not found: {}",
                    scenario.name,
                    root.join(&scenario.dir).display()
                ),
            );
        }

        if scenario.plan_file.as_deref().is_some_and(Path::is_absolute) {
            result.error(
                format!("{prefix}.plan_file"),
                format!("Scenario '{}' plan file must be a relative path", scenario.name),
            );
        }

        Self::validate_expectations(&prefix, scenario, policy, result);

        let mut case_names = HashSet::new();
        for (j, case) in scenario.cases.iter().enumerate() {
            if !is_valid_name(&case.name) {
                result.error(
                    format!("{prefix}.cases[{j}].name"),
                    format!("Case name '{}' is invalid", case.name),
                );
            }
            if !case_names.insert(case.name.as_str()) {
                result.error(
                    format!("{prefix}.cases[{j}].name"),
                    format!("Duplicate case '{}' in scenario '{}'", case.name, scenario.name),
                );
            }
        }
    }

    /// Validates a scenario's expectations.
    fn validate_expectations(
        prefix: &str,
        scenario: &ScenarioConfig,
        policy: EmptyExpectationPolicy,
        result: &mut ValidationResult,
    ) {
        let expect = &scenario.expect;

        if expect.resource_types.is_empty() {
            match policy {
                EmptyExpectationPolicy::Reject => result.error(
                    format!("{prefix}.expect.resource_types"),
                    format!("Scenario '{}' expects no resource types", scenario.name),
                ),
                EmptyExpectationPolicy::Vacuous => result.warnings.push(format!(
                    "Scenario '{}' expects no resource types; its type check always passes",
                    scenario.name
                )),
            }
        }

        for (k, resource_type) in expect.resource_types.iter().enumerate() {
            if !is_valid_resource_type(resource_type) {
                result.error(
                    format!("{prefix}.expect.resource_types[{k}]"),
                    format!("'{resource_type}' is not a valid resource type identifier"),
                );
            }
        }

        if expect.min_changes == Some(0) {
            result.error(
                format!("{prefix}.expect.min_changes"),
                "min_changes must be at least 1 when set",
            );
        }
    }

    /// Validates that scenario names are unique.
    fn validate_unique_names(scenarios: &[ScenarioConfig], result: &mut ValidationResult) {
        let mut names = HashSet::new();
        for (i, scenario) in scenarios.iter().enumerate() {
            if !names.insert(scenario.name.as_str()) {
                result.error(
                    format!("scenarios[{i}].name"),
                    format!("Duplicate scenario name: {}", scenario.name),
                );
            }
        }
    }

    /// Validates that no two runs write the same plan artifact.
    fn validate_plan_files(config: &SuiteConfig, result: &mut ValidationResult) {
        let mut seen: HashMap<PathBuf, String> = HashMap::new();
        for run in config.expand_runs() {
            let artifact = run.dir.join(&run.plan_file);
            if let Some(other) = seen.get(&artifact) {
                result.error(
                    format!("scenarios.{}.plan_file", run.name),
                    format!(
                        "Runs '{other}' and '{}' both write {}",
                        run.name,
                        artifact.display()
                    ),
                );
            } else {
                seen.insert(artifact, run.name);
            }
        }
    }

    /// Warns about parallel runs that would share a directory in place.
    fn validate_in_place_dirs(config: &SuiteConfig, result: &mut ValidationResult) {
        let runs = config.expand_runs();
        let mut per_dir: HashMap<&Path, usize> = HashMap::new();
        for run in &runs {
            *per_dir.entry(run.dir.as_path()).or_default() += 1;
        }

        let mut shared: Vec<_> = runs
            .iter()
            .filter(|run| run.parallel && per_dir.get(run.dir.as_path()).is_some_and(|n| *n > 1))
            .map(|run| run.name.as_str())
            .collect();
        shared.sort();

        if !shared.is_empty() {
            result.warnings.push(format!(
                "Runs {} share a directory without isolated workspaces and will run serially",
                shared.join(", ")
            ));
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

/// Validates a resource type identifier such as `azurerm_subnet`.
fn is_valid_resource_type(resource_type: &str) -> bool {
    let mut chars = resource_type.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl ValidationResult {
    /// Records an error.
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
