//! Plan requests.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default plan artifact name when a request does not name one.
pub const DEFAULT_PLAN_FILE: &str = "plancheck.tfplan";

/// Extension of the generated variables file, which sits beside the plan artifact.
pub const VARS_EXTENSION: &str = "tfvars.json";

/// Input variables keyed by name.
pub type Variables = BTreeMap<String, Value>;

/// A request to plan one configuration directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    /// Configuration directory.
    pub config_dir: PathBuf,
    /// Input variables.
    pub variables: Variables,
    /// Plan artifact path, relative to `config_dir` unless absolute.
    pub plan_file: Option<PathBuf>,
}

impl PlanRequest {
    /// Creates a request for a directory with no variables.
    #[must_use]
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            variables: Variables::new(),
            plan_file: None,
        }
    }

    /// Adds a single variable.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Replaces all variables.
    #[must_use]
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Sets the plan artifact path.
    #[must_use]
    pub fn with_plan_file(mut self, plan_file: impl Into<PathBuf>) -> Self {
        self.plan_file = Some(plan_file.into());
        self
    }

    /// Resolves the plan artifact path against the configuration directory.
    #[must_use]
    pub fn plan_path(&self) -> PathBuf {
        let file = self
            .plan_file
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_PLAN_FILE));
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.config_dir.join(file)
        }
    }

    /// Returns the path of the generated variables file.
    ///
    /// The file is named after the plan artifact, so requests with distinct
    /// plan files in the same directory never share one.
    #[must_use]
    pub fn vars_path(&self) -> PathBuf {
        self.plan_path().with_extension(VARS_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_path_resolution() {
        let request = PlanRequest::new("/work/modules/network");
        assert_eq!(
            request.plan_path(),
            PathBuf::from("/work/modules/network/plancheck.tfplan")
        );

        let request = request.with_plan_file("network.tfplan");
        assert_eq!(
            request.plan_path(),
            PathBuf::from("/work/modules/network/network.tfplan")
        );

        let request = request.with_plan_file("/tmp/abs.tfplan");
        assert_eq!(request.plan_path(), PathBuf::from("/tmp/abs.tfplan"));
    }

    #[test]
    fn test_vars_path_follows_plan_file() {
        let request = PlanRequest::new("/work");
        assert_eq!(request.vars_path(), PathBuf::from("/work/plancheck.tfvars.json"));

        let a = request.clone().with_plan_file("root-rsa-key.tfplan");
        let b = request.with_plan_file("root-ed25519-key.tfplan");
        assert_eq!(a.vars_path(), PathBuf::from("/work/root-rsa-key.tfvars.json"));
        assert_ne!(a.vars_path(), b.vars_path());
    }

    #[test]
    fn test_variables_builder() {
        let request = PlanRequest::new("modules/network")
            .with_var("location", "westeurope")
            .with_var("address_space", json!(["10.10.0.0/16"]));

        assert_eq!(request.variables.len(), 2);
        assert_eq!(request.variables["location"], json!("westeurope"));
    }
}
