//! Terraform CLI backend.
//!
//! This module drives the `terraform` binary (or a compatible one such as
//! `tofu`) as a child process: `init`, `plan -out`, then `show -json`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, trace};

use crate::config::TerraformConfig;
use crate::error::{ExecutionError, PlanCheckError, Result, SetupError};
use crate::planner::{PlanRequest, PlanResult};

use super::backend::PlanBackend;
use super::environment::ProviderEnvironment;

/// Default binary name.
pub const DEFAULT_BINARY: &str = "terraform";

/// Terraform CLI backend.
#[derive(Debug, Clone)]
pub struct TerraformCli {
    /// Binary to invoke.
    binary: String,
    /// Extra arguments appended to `init`.
    init_args: Vec<String>,
    /// Extra arguments appended to `plan`.
    plan_args: Vec<String>,
}

impl Default for TerraformCli {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl TerraformCli {
    /// Creates a backend for the given binary.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            init_args: Vec::new(),
            plan_args: Vec::new(),
        }
    }

    /// Creates a backend from suite settings.
    #[must_use]
    pub fn from_config(config: &TerraformConfig) -> Self {
        Self::new(config.binary.clone())
            .with_init_args(config.init_args.clone())
            .with_plan_args(config.plan_args.clone())
    }

    /// Sets extra `init` arguments.
    #[must_use]
    pub fn with_init_args(mut self, args: Vec<String>) -> Self {
        self.init_args = args;
        self
    }

    /// Sets extra `plan` arguments.
    #[must_use]
    pub fn with_plan_args(mut self, args: Vec<String>) -> Self {
        self.plan_args = args;
        self
    }

    /// Returns the binary this backend invokes.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Runs the binary with the given arguments in `dir`.
    async fn run(&self, dir: &Path, args: &[String], env: &ProviderEnvironment) -> Result<Output> {
        debug!("Running {} {} in {}", self.binary, args.join(" "), dir.display());

        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .envs(env.iter())
            .env("TF_IN_AUTOMATION", "1")
            .env("TF_INPUT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    PlanCheckError::Setup(SetupError::BinaryUnavailable {
                        binary: self.binary.clone(),
                        message: e.to_string(),
                    })
                }
                _ => PlanCheckError::Io(e),
            })?;

        trace!(
            "{} exited with {:?} ({} bytes stdout, {} bytes stderr)",
            self.binary,
            output.status.code(),
            output.stdout.len(),
            output.stderr.len()
        );

        Ok(output)
    }

    /// Runs `init` in the request's directory.
    async fn init(&self, request: &PlanRequest, env: &ProviderEnvironment) -> Result<()> {
        let mut args = vec![
            String::from("init"),
            String::from("-input=false"),
            String::from("-upgrade=false"),
            String::from("-no-color"),
        ];
        args.extend(self.init_args.iter().cloned());

        let output = self.run(&request.config_dir, &args, env).await?;
        if !output.status.success() {
            return Err(SetupError::InitFailed {
                dir: request.config_dir.clone(),
                exit_code: output.status.code(),
                stderr: diagnostics(&output),
            }
            .into());
        }

        Ok(())
    }

    /// Writes the request's variables to a JSON variables file.
    ///
    /// Returns `None` when the request has no variables.
    async fn write_vars(request: &PlanRequest) -> Result<Option<PathBuf>> {
        if request.variables.is_empty() {
            return Ok(None);
        }

        let path = request.vars_path();
        let content = serde_json::to_vec_pretty(&request.variables).map_err(|e| {
            SetupError::VariablesFile {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| SetupError::VariablesFile {
                path: path.clone(),
                message: e.to_string(),
            })?;

        debug!("Wrote {} variable(s) to {}", request.variables.len(), path.display());
        Ok(Some(path))
    }
}

#[async_trait]
impl PlanBackend for TerraformCli {
    async fn plan(&self, request: &PlanRequest, env: &ProviderEnvironment) -> Result<PathBuf> {
        info!("Planning {}", request.config_dir.display());

        self.init(request, env).await?;

        let artifact = request.plan_path();
        if let Some(parent) = artifact.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut args = vec![
            String::from("plan"),
            String::from("-input=false"),
            String::from("-lock=false"),
            String::from("-no-color"),
            format!("-out={}", artifact.display()),
        ];
        if let Some(vars_file) = Self::write_vars(request).await? {
            args.push(format!("-var-file={}", vars_file.display()));
        }
        args.extend(self.plan_args.iter().cloned());

        let output = self.run(&request.config_dir, &args, env).await?;
        if !output.status.success() {
            return Err(ExecutionError::PlanFailed {
                dir: request.config_dir.clone(),
                exit_code: output.status.code(),
                stderr: diagnostics(&output),
            }
            .into());
        }

        Ok(artifact)
    }

    async fn show(
        &self,
        request: &PlanRequest,
        artifact: &Path,
        env: &ProviderEnvironment,
    ) -> Result<PlanResult> {
        let args = vec![
            String::from("show"),
            String::from("-json"),
            String::from("-no-color"),
            artifact.display().to_string(),
        ];

        let output = self.run(&request.config_dir, &args, env).await?;
        if !output.status.success() {
            return Err(ExecutionError::ShowFailed {
                artifact: artifact.to_path_buf(),
                exit_code: output.status.code(),
                stderr: diagnostics(&output),
            }
            .into());
        }

        PlanResult::from_json(&output.stdout)
    }

    fn backend_type(&self) -> &'static str {
        "terraform-cli"
    }
}

/// Extracts the tool's diagnostic text, preferring stderr.
fn diagnostics(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_from_config() {
        let config = TerraformConfig {
            binary: String::from("tofu"),
            init_args: vec![String::from("-backend=false")],
            plan_args: vec![String::from("-refresh=false")],
        };
        let cli = TerraformCli::from_config(&config);

        assert_eq!(cli.binary(), "tofu");
        assert_eq!(cli.init_args, vec![String::from("-backend=false")]);
        assert_eq!(cli.plan_args, vec![String::from("-refresh=false")]);
    }

    #[tokio::test]
    async fn test_write_vars() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let request = PlanRequest::new(temp.path())
            .with_var("nsg_name", "tt-nsg")
            .with_var("tags", json!({"env": "demo"}));

        let path = TerraformCli::write_vars(&request)
            .await
            .expect("should write vars")
            .expect("vars file should exist");

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read vars"))
                .expect("vars should be JSON");
        assert_eq!(written["nsg_name"], json!("tt-nsg"));
        assert_eq!(written["tags"]["env"], json!("demo"));
    }

    #[tokio::test]
    async fn test_write_vars_skipped_without_variables() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let request = PlanRequest::new(temp.path());

        let path = TerraformCli::write_vars(&request).await.expect("should not fail");
        assert!(path.is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_is_setup_error() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let cli = TerraformCli::new("plancheck-definitely-not-a-real-binary");
        let request = PlanRequest::new(temp.path());

        let err = cli
            .plan(&request, &ProviderEnvironment::new())
            .await
            .expect_err("binary does not exist");
        assert!(matches!(
            err,
            PlanCheckError::Setup(SetupError::BinaryUnavailable { .. })
        ));
    }
}
