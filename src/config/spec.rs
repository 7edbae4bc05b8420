//! Suite file types.
//!
//! This module defines the structs that map to `plancheck.yaml`. A suite
//! declares the scenarios to plan, the expectations for each, and how the
//! planning tool is invoked.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::harness::EmptyExpectationPolicy;
use crate::planner::{Expectations, PlanRequest, Variables};
use crate::terraform::DEFAULT_BINARY;

/// The root structure of a suite file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuiteConfig {
    /// Suite-level settings.
    pub suite: SuiteSettings,
    /// Planning tool settings.
    #[serde(default)]
    pub terraform: TerraformConfig,
    /// Provider environment rules.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Defaults applied to every scenario.
    #[serde(default)]
    pub defaults: DefaultsConfig,
    /// Scenarios to plan.
    pub scenarios: Vec<ScenarioConfig>,
}

/// Suite-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuiteSettings {
    /// Suite name.
    pub name: String,
    /// Root directory, relative to the suite file. Scenario directories are
    /// resolved against it and it is what gets copied into workspaces.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

/// Planning tool settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TerraformConfig {
    /// Binary to invoke (`terraform`, `tofu`, or a path).
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Extra arguments for `init`.
    #[serde(default)]
    pub init_args: Vec<String>,
    /// Extra arguments for `plan`.
    #[serde(default)]
    pub plan_args: Vec<String>,
}

/// Which process environment variables reach the planning tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Name prefixes passed through (e.g. `ARM_`).
    #[serde(default)]
    pub passthrough: Vec<String>,
    /// Variables that must be set.
    #[serde(default)]
    pub required: Vec<String>,
}

/// Defaults applied to every scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultsConfig {
    /// Maximum number of parallel scenario runs.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Policy for scenarios with no expected resource types.
    #[serde(default)]
    pub empty_expectations: EmptyExpectationPolicy,
    /// Plan each run in its own copy of the suite root.
    #[serde(default = "default_true")]
    pub isolate_workspaces: bool,
    /// Keep workspaces after the run.
    #[serde(default)]
    pub keep_workspaces: bool,
}

/// A single scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioConfig {
    /// Unique scenario name.
    pub name: String,
    /// Configuration directory, relative to the suite root.
    pub dir: PathBuf,
    /// Plan artifact file name, relative to the configuration directory.
    #[serde(default)]
    pub plan_file: Option<PathBuf>,
    /// Whether the scenario may run alongside others.
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Input variables.
    #[serde(default)]
    pub vars: Variables,
    /// Expectations for the plan.
    #[serde(default)]
    pub expect: Expectations,
    /// Table-driven variants.
    #[serde(default)]
    pub cases: Vec<CaseConfig>,
}

/// A table-driven variant of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseConfig {
    /// Case name, unique within its scenario.
    pub name: String,
    /// Variables merged over the scenario's variables.
    #[serde(default)]
    pub vars: Variables,
}

/// One expanded unit of work: a scenario, or one case of a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioRun {
    /// Display name (`scenario` or `scenario/case`).
    pub name: String,
    /// Configuration directory, relative to the suite root.
    pub dir: PathBuf,
    /// Plan artifact file name.
    pub plan_file: PathBuf,
    /// Whether the run may execute alongside others.
    pub parallel: bool,
    /// Merged variables.
    pub vars: Variables,
    /// Expectations for the plan.
    pub expect: Expectations,
}

impl SuiteConfig {
    /// Expands scenarios and their cases into runs, in declaration order.
    #[must_use]
    pub fn expand_runs(&self) -> Vec<ScenarioRun> {
        self.scenarios.iter().flat_map(ScenarioConfig::expand).collect()
    }

    /// Resolves the suite root against the directory holding the suite file.
    #[must_use]
    pub fn resolve_root(&self, suite_dir: &Path) -> PathBuf {
        if self.suite.root.is_absolute() {
            self.suite.root.clone()
        } else {
            suite_dir.join(&self.suite.root)
        }
    }

    /// Returns the total number of expanded runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.scenarios
            .iter()
            .map(|s| s.cases.len().max(1))
            .sum()
    }
}

impl ScenarioConfig {
    /// Expands this scenario into one run per case, or a single run.
    #[must_use]
    pub fn expand(&self) -> Vec<ScenarioRun> {
        let base_plan_file = self
            .plan_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.tfplan", self.name)));

        if self.cases.is_empty() {
            return vec![ScenarioRun {
                name: self.name.clone(),
                dir: self.dir.clone(),
                plan_file: base_plan_file,
                parallel: self.parallel,
                vars: self.vars.clone(),
                expect: self.expect.clone(),
            }];
        }

        self.cases
            .iter()
            .map(|case| {
                let mut vars = self.vars.clone();
                vars.extend(case.vars.iter().map(|(k, v)| (k.clone(), v.clone())));

                ScenarioRun {
                    name: format!("{}/{}", self.name, case.name),
                    dir: self.dir.clone(),
                    plan_file: case_plan_file(&base_plan_file, &case.name),
                    parallel: self.parallel,
                    vars,
                    expect: self.expect.clone(),
                }
            })
            .collect()
    }
}

impl ScenarioRun {
    /// Builds the plan request for this run inside a given root directory.
    #[must_use]
    pub fn request(&self, root: &Path) -> PlanRequest {
        PlanRequest::new(root.join(&self.dir))
            .with_variables(self.vars.clone())
            .with_plan_file(self.plan_file.clone())
    }

    /// Returns a filesystem-safe form of the run name.
    #[must_use]
    pub fn slug(&self) -> String {
        self.name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    }
}

/// Inserts the case name before the plan file's extension.
fn case_plan_file(base: &Path, case: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map_or_else(|| String::from("plan"), |s| s.to_string_lossy().to_string());
    let file_name = base.extension().map_or_else(
        || format!("{stem}-{case}"),
        |ext| format!("{stem}-{case}.{}", ext.to_string_lossy()),
    );
    base.with_file_name(file_name)
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            init_args: Vec::new(),
            plan_args: Vec::new(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            empty_expectations: EmptyExpectationPolicy::default(),
            isolate_workspaces: true,
            keep_workspaces: false,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_binary() -> String {
    String::from(DEFAULT_BINARY)
}

const fn default_parallelism() -> usize {
    4
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root_scenario() -> ScenarioConfig {
        let mut vars = Variables::new();
        vars.insert(String::from("location"), json!("westeurope"));
        vars.insert(String::from("ssh_public_key"), json!("placeholder"));

        ScenarioConfig {
            name: String::from("root"),
            dir: PathBuf::from("."),
            plan_file: Some(PathBuf::from("root.tfplan")),
            parallel: false,
            vars,
            expect: Expectations::default().with_min_changes(1),
            cases: vec![
                CaseConfig {
                    name: String::from("rsa-a"),
                    vars: [(String::from("ssh_public_key"), json!("ssh-rsa AAAA a"))]
                        .into_iter()
                        .collect(),
                },
                CaseConfig {
                    name: String::from("rsa-b"),
                    vars: [(String::from("ssh_public_key"), json!("ssh-rsa AAAA b"))]
                        .into_iter()
                        .collect(),
                },
            ],
        }
    }

    #[test]
    fn test_expand_without_cases() {
        let scenario = ScenarioConfig {
            cases: vec![],
            plan_file: None,
            ..root_scenario()
        };
        let runs = scenario.expand();

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].name, "root");
        assert_eq!(runs[0].plan_file, PathBuf::from("root.tfplan"));
        assert!(!runs[0].parallel);
    }

    #[test]
    fn test_expand_cases_merge_vars() {
        let runs = root_scenario().expand();

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].name, "root/rsa-a");
        assert_eq!(runs[0].plan_file, PathBuf::from("root-rsa-a.tfplan"));
        assert_eq!(runs[1].plan_file, PathBuf::from("root-rsa-b.tfplan"));
        assert_eq!(runs[0].vars["ssh_public_key"], json!("ssh-rsa AAAA a"));
        assert_eq!(runs[1].vars["ssh_public_key"], json!("ssh-rsa AAAA b"));
        assert_eq!(runs[0].vars["location"], json!("westeurope"));
        assert_eq!(runs[0].expect.min_changes, Some(1));
    }

    #[test]
    fn test_run_request_and_slug() {
        let run = &root_scenario().expand()[0];
        let request = run.request(Path::new("/work"));

        assert_eq!(request.config_dir, PathBuf::from("/work/."));
        assert_eq!(request.plan_path(), PathBuf::from("/work/./root-rsa-a.tfplan"));
        assert_eq!(run.slug(), "root_rsa-a");
    }
}
