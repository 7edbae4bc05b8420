//! Plan assertion harness.
//!
//! This module runs a single plan through a [`PlanBackend`] and checks the
//! rendered result against a set of expectations. It is a single-shot
//! operation: plan, render, assert. It never applies anything.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{ExecutionError, Result, SetupError};
use crate::planner::{ChangeSummary, ExpectationReport, Expectations, PlanRequest, PlanResult};
use crate::terraform::{PlanBackend, ProviderEnvironment};

/// How an empty set of expected resource types is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyExpectationPolicy {
    /// An empty set always passes.
    #[default]
    Vacuous,
    /// An empty set is a caller error, raised before planning.
    Reject,
}

/// Harness running plans and checking them.
#[derive(Debug)]
pub struct PlanHarness<B: PlanBackend> {
    /// Planning backend.
    backend: B,
    /// Environment handed to the backend.
    environment: ProviderEnvironment,
    /// Policy for empty expectation sets.
    empty_policy: EmptyExpectationPolicy,
}

/// Successful outcome of a plan assertion.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    /// Path of the written plan artifact.
    pub artifact: PathBuf,
    /// Evaluated expectations.
    pub report: ExpectationReport,
    /// Change counts by kind.
    pub summary: ChangeSummary,
    /// The rendered plan.
    #[serde(skip)]
    pub plan: PlanResult,
}

impl<B: PlanBackend> PlanHarness<B> {
    /// Creates a new harness.
    #[must_use]
    pub const fn new(backend: B, environment: ProviderEnvironment) -> Self {
        Self {
            backend,
            environment,
            empty_policy: EmptyExpectationPolicy::Vacuous,
        }
    }

    /// Sets the empty expectation policy.
    #[must_use]
    pub const fn with_empty_policy(mut self, policy: EmptyExpectationPolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    /// Returns the planning backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Plans the request and renders the result, without assertions.
    ///
    /// # Errors
    ///
    /// Returns a setup error if the directory is unusable or the tool cannot
    /// start, and an execution error if planning or rendering fails.
    pub async fn plan(&self, request: &PlanRequest) -> Result<(PathBuf, PlanResult)> {
        ensure_config_dir(&request.config_dir).await?;

        let artifact = self.backend.plan(request, &self.environment).await?;
        debug!("Plan artifact written to {}", artifact.display());

        let plan = self
            .backend
            .show(request, &artifact, &self.environment)
            .await?;

        if plan.errored {
            return Err(ExecutionError::ErroredPlan {
                dir: request.config_dir.clone(),
            }
            .into());
        }

        info!(
            "Plan for {}: {} ({} resource changes)",
            request.config_dir.display(),
            plan.summary(),
            plan.change_count()
        );

        Ok((artifact, plan))
    }

    /// Plans the request and checks that every expected type is present.
    ///
    /// # Errors
    ///
    /// Returns an assertion error naming every missing type, or a setup or
    /// execution error if the plan could not be produced.
    pub async fn run_plan_and_assert(
        &self,
        request: &PlanRequest,
        expected_types: &[String],
    ) -> Result<PlanOutcome> {
        let expectations = Expectations::types(expected_types.iter().cloned());
        self.run_with_expectations(request, &expectations).await
    }

    /// Plans the request and checks it against full expectations.
    ///
    /// # Errors
    ///
    /// Same as [`Self::run_plan_and_assert`].
    pub async fn run_with_expectations(
        &self,
        request: &PlanRequest,
        expectations: &Expectations,
    ) -> Result<PlanOutcome> {
        if expectations.resource_types.is_empty() {
            match self.empty_policy {
                EmptyExpectationPolicy::Reject => {
                    return Err(SetupError::EmptyExpectations.into());
                }
                EmptyExpectationPolicy::Vacuous => {
                    warn!(
                        "No expected resource types for {}; type check passes trivially",
                        request.config_dir.display()
                    );
                }
            }
        }

        let (artifact, plan) = self.plan(request).await?;
        let report = expectations.check(&plan)?;

        info!(
            "All {} expected resource type(s) present in {}",
            report.matched.len(),
            request.config_dir.display()
        );

        Ok(PlanOutcome {
            artifact,
            report,
            summary: plan.summary(),
            plan,
        })
    }
}

/// Checks that a directory exists and holds configuration files.
///
/// # Errors
///
/// Returns a setup error if the directory is missing or has no `.tf` or
/// `.tf.json` files.
pub async fn ensure_config_dir(dir: &Path) -> Result<()> {
    let is_dir = tokio::fs::metadata(dir)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(SetupError::ConfigDirMissing {
            path: dir.to_path_buf(),
        }
        .into());
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".tf") || name.ends_with(".tf.json") {
            return Ok(());
        }
    }

    Err(SetupError::NoConfigurationFiles {
        path: dir.to_path_buf(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AssertionError, PlanCheckError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Name of the canned plan each fake configuration carries.
    const FIXTURE: &str = "fixture.plan.json";

    /// Backend that "plans" by reading a canned plan from the directory.
    #[derive(Default)]
    struct FakeBackend {
        plan_calls: AtomicUsize,
        fail_plan: bool,
    }

    #[async_trait]
    impl PlanBackend for FakeBackend {
        async fn plan(&self, request: &PlanRequest, _env: &ProviderEnvironment) -> Result<PathBuf> {
            self.plan_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_plan {
                return Err(ExecutionError::PlanFailed {
                    dir: request.config_dir.clone(),
                    exit_code: Some(1),
                    stderr: String::from("Error: building AzureRM Client: please ensure you have installed Azure CLI"),
                }
                .into());
            }
            Ok(request.plan_path())
        }

        async fn show(
            &self,
            request: &PlanRequest,
            _artifact: &Path,
            _env: &ProviderEnvironment,
        ) -> Result<PlanResult> {
            let bytes = tokio::fs::read(request.config_dir.join(FIXTURE)).await?;
            PlanResult::from_json(&bytes)
        }

        fn backend_type(&self) -> &'static str {
            "fake"
        }
    }

    fn resource(ty: &str, name: &str) -> serde_json::Value {
        serde_json::json!({
            "address": format!("{ty}.{name}"),
            "mode": "managed",
            "type": ty,
            "name": name,
            "change": { "actions": ["create"] }
        })
    }

    fn config_dir(resources: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp.path().join("main.tf"), "# fixture\n").expect("write main.tf");

        let changes: Vec<_> = resources.iter().map(|(ty, name)| resource(ty, name)).collect();
        let plan = serde_json::json!({
            "format_version": "1.2",
            "terraform_version": "1.9.5",
            "resource_changes": changes,
        });
        std::fs::write(temp.path().join(FIXTURE), plan.to_string()).expect("write fixture");
        temp
    }

    fn types(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn harness() -> PlanHarness<FakeBackend> {
        PlanHarness::new(FakeBackend::default(), ProviderEnvironment::new())
    }

    const NETWORK: &[(&str, &str)] = &[
        ("azurerm_virtual_network", "this"),
        ("azurerm_subnet", "this"),
        ("azurerm_public_ip", "this"),
    ];

    #[tokio::test]
    async fn test_network_plan_passes() {
        let dir = config_dir(NETWORK);
        let request = PlanRequest::new(dir.path()).with_plan_file("network.tfplan");

        let outcome = harness()
            .run_plan_and_assert(
                &request,
                &types(&["azurerm_virtual_network", "azurerm_subnet", "azurerm_public_ip"]),
            )
            .await
            .expect("all network resources are planned");

        assert_eq!(outcome.report.matched.len(), 3);
        assert_eq!(outcome.summary.create, 3);
        assert_eq!(outcome.artifact, dir.path().join("network.tfplan"));
    }

    #[tokio::test]
    async fn test_network_plan_without_public_ip_fails() {
        let dir = config_dir(&NETWORK[..2]);
        let request = PlanRequest::new(dir.path());

        let err = harness()
            .run_plan_and_assert(
                &request,
                &types(&["azurerm_virtual_network", "azurerm_subnet", "azurerm_public_ip"]),
            )
            .await
            .expect_err("public ip is not planned");

        match err {
            PlanCheckError::Assertion(failure) => {
                assert_eq!(failure.missing_types(), vec!["azurerm_public_ip"]);
            }
            other => panic!("expected assertion failure, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_security_group_without_rules_fails() {
        let dir = config_dir(&[("azurerm_network_security_group", "this")]);
        let request = PlanRequest::new(dir.path());

        let err = harness()
            .run_plan_and_assert(
                &request,
                &types(&["azurerm_network_security_group", "azurerm_network_security_rule"]),
            )
            .await
            .expect_err("no rule resource planned");

        assert!(matches!(
            err,
            PlanCheckError::Assertion(AssertionError::MissingResourceTypes { ref missing, .. })
                if missing == &types(&["azurerm_network_security_rule"])
        ));
    }

    #[tokio::test]
    async fn test_every_missing_type_is_reported() {
        let dir = config_dir(&[("azurerm_resource_group", "this")]);
        let request = PlanRequest::new(dir.path());

        let err = harness()
            .run_plan_and_assert(
                &request,
                &types(&["azurerm_virtual_network", "azurerm_subnet", "azurerm_public_ip"]),
            )
            .await
            .expect_err("nothing expected is planned");

        let message = err.to_string();
        for missing in ["azurerm_virtual_network", "azurerm_subnet", "azurerm_public_ip"] {
            assert!(message.contains(missing), "{missing} not named in: {message}");
        }
    }

    #[tokio::test]
    async fn test_repeated_runs_agree() {
        let dir = config_dir(NETWORK);
        let request = PlanRequest::new(dir.path());
        let harness = harness();
        let expected = types(&["azurerm_subnet", "azurerm_network_security_rule"]);

        let first = harness.run_plan_and_assert(&request, &expected).await;
        let second = harness.run_plan_and_assert(&request, &expected).await;

        assert!(first.is_err());
        assert!(second.is_err());
        assert_eq!(first.err().map(|e| e.to_string()), second.err().map(|e| e.to_string()));
        assert_eq!(harness.backend().plan_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_expectations_vacuous() {
        let dir = config_dir(&[]);
        let request = PlanRequest::new(dir.path());

        let outcome = harness()
            .run_plan_and_assert(&request, &[])
            .await
            .expect("empty expectations pass");
        assert!(outcome.report.matched.is_empty());
    }

    #[tokio::test]
    async fn test_empty_expectations_rejected_before_planning() {
        let dir = config_dir(NETWORK);
        let request = PlanRequest::new(dir.path());
        let harness = harness().with_empty_policy(EmptyExpectationPolicy::Reject);

        let err = harness
            .run_plan_and_assert(&request, &[])
            .await
            .expect_err("empty expectations rejected");

        assert!(matches!(err, PlanCheckError::Setup(SetupError::EmptyExpectations)));
        assert_eq!(harness.backend().plan_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_directory_is_setup_error() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let request = PlanRequest::new(temp.path().join("modules/network"));
        let harness = harness();

        let err = harness
            .run_plan_and_assert(&request, &types(&["azurerm_subnet"]))
            .await
            .expect_err("directory does not exist");

        assert!(matches!(err, PlanCheckError::Setup(SetupError::ConfigDirMissing { .. })));
        assert_eq!(harness.backend().plan_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_directory_without_configuration_is_setup_error() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp.path().join("README.md"), "nothing here").expect("write readme");

        let err = ensure_config_dir(temp.path())
            .await
            .expect_err("no .tf files");
        assert!(matches!(err, PlanCheckError::Setup(SetupError::NoConfigurationFiles { .. })));
    }

    #[tokio::test]
    async fn test_plan_failure_aborts_before_assertions() {
        let dir = config_dir(NETWORK);
        let request = PlanRequest::new(dir.path());
        let harness = PlanHarness::new(
            FakeBackend {
                fail_plan: true,
                ..FakeBackend::default()
            },
            ProviderEnvironment::new(),
        );

        let err = harness
            .run_plan_and_assert(&request, &types(&["azurerm_subnet"]))
            .await
            .expect_err("plan fails");

        assert!(matches!(err, PlanCheckError::Execution(ExecutionError::PlanFailed { .. })));
        assert!(err.to_string().contains("AzureRM"));
    }

    #[tokio::test]
    async fn test_errored_plan_is_execution_error() {
        let dir = config_dir(&[]);
        std::fs::write(
            dir.path().join(FIXTURE),
            r#"{"format_version":"1.2","errored":true,"resource_changes":[]}"#,
        )
        .expect("write fixture");

        let err = harness()
            .run_plan_and_assert(&PlanRequest::new(dir.path()), &types(&["azurerm_subnet"]))
            .await
            .expect_err("errored plan");
        assert!(matches!(err, PlanCheckError::Execution(ExecutionError::ErroredPlan { .. })));
    }
}
