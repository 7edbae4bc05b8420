//! Suite file parser.
//!
//! This module loads `plancheck.yaml`, applies environment overrides, loads a
//! neighbouring `.env`, and resolves the provider environment.

use crate::error::{ConfigError, PlanCheckError, Result};
use crate::terraform::ProviderEnvironment;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::spec::SuiteConfig;

/// Parser for loading suite files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a suite from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<SuiteConfig> {
        let path = path.as_ref();
        info!("Loading suite from: {}", path.display());

        if !path.exists() {
            return Err(PlanCheckError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PlanCheckError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a suite from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<SuiteConfig> {
        debug!("Parsing YAML suite");

        let config: SuiteConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            PlanCheckError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed suite '{}' with {} scenario(s)",
            config.suite.name,
            config.scenarios.len()
        );
        Ok(config)
    }

    /// Loads a suite with environment variable overrides.
    ///
    /// Recognized variables: `PLANCHECK_TERRAFORM_BINARY` and
    /// `PLANCHECK_PARALLELISM`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// has an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<SuiteConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Applies environment variable overrides to the suite.
    fn apply_env_overrides(config: &mut SuiteConfig) -> Result<()> {
        if let Ok(binary) = std::env::var("PLANCHECK_TERRAFORM_BINARY") {
            debug!("Overriding terraform.binary from environment");
            config.terraform.binary = binary;
        }

        if let Ok(parallelism) = std::env::var("PLANCHECK_PARALLELISM") {
            debug!("Overriding defaults.parallelism from environment");
            config.defaults.parallelism = parallelism.parse().map_err(|_| {
                ConfigError::validation(
                    format!("PLANCHECK_PARALLELISM must be a positive integer, got '{parallelism}'"),
                    "defaults.parallelism",
                )
            })?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                PlanCheckError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Resolves the provider environment from the current process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is not set.
    pub fn resolve_provider_env(config: &SuiteConfig) -> Result<ProviderEnvironment> {
        let snapshot = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        let env = ProviderEnvironment::from_snapshot(
            snapshot,
            &config.environment.passthrough,
            &config.environment.required,
        )?;

        if env.is_empty() && !config.environment.passthrough.is_empty() {
            warn!(
                "No environment variables matched prefixes {:?}; provider credentials may be missing",
                config.environment.passthrough
            );
        } else {
            debug!("Resolved {} provider environment variable(s)", env.len());
        }

        Ok(env)
    }

    /// Returns the scratch directory for workspaces.
    ///
    /// Uses `PLANCHECK_SCRATCH_DIR` when set, else the system temp directory.
    #[must_use]
    pub fn scratch_dir() -> PathBuf {
        std::env::var_os("PLANCHECK_SCRATCH_DIR")
            .map_or_else(|| std::env::temp_dir().join("plancheck"), PathBuf::from)
    }
}

/// Default suite file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["plancheck.yaml", "plancheck.yml", ".plancheck.yaml"];

/// Finds the suite file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no suite file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found suite file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(PlanCheckError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::EmptyExpectationPolicy;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_suite() {
        let yaml = r"
suite:
  name: minimal
scenarios: []
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).expect("suite should parse");

        assert_eq!(config.suite.name, "minimal");
        assert_eq!(config.suite.root, PathBuf::from("."));
        assert_eq!(config.terraform.binary, "terraform");
        assert_eq!(config.defaults.parallelism, 4);
        assert!(config.defaults.isolate_workspaces);
        assert_eq!(config.defaults.empty_expectations, EmptyExpectationPolicy::Vacuous);
    }

    #[test]
    fn test_parse_full_suite() {
        let yaml = r#"
suite:
  name: iac-lab
  root: ..

terraform:
  binary: tofu
  init_args: ["-backend=false"]

environment:
  passthrough: ["ARM_"]
  required: ["ARM_SUBSCRIPTION_ID"]

defaults:
  parallelism: 2
  empty_expectations: reject

scenarios:
  - name: security
    dir: modules/security
    plan_file: security.tfplan
    vars:
      nsg_name: tt-nsg
      security_rules:
        - name: AllowSSH
          priority: 1001
          destination_port_range: "22"
    expect:
      resource_types:
        - azurerm_network_security_group
        - azurerm_network_security_rule

  - name: root
    dir: .
    parallel: false
    vars:
      tags:
        project: iac-lab
    expect:
      min_changes: 1
    cases:
      - name: key-a
        vars:
          ssh_public_key: "ssh-rsa AAAA a"
"#;
        let config = ConfigParser::new()
            .parse_yaml(yaml, None)
            .expect("suite should parse");

        assert_eq!(config.terraform.binary, "tofu");
        assert_eq!(config.environment.passthrough, vec![String::from("ARM_")]);
        assert_eq!(config.defaults.empty_expectations, EmptyExpectationPolicy::Reject);
        assert_eq!(config.scenarios.len(), 2);

        let security = &config.scenarios[0];
        assert!(security.parallel);
        assert_eq!(security.expect.resource_types.len(), 2);
        assert_eq!(security.vars["security_rules"][0]["priority"], json!(1001));

        let root = &config.scenarios[1];
        assert!(!root.parallel);
        assert_eq!(root.expect.min_changes, Some(1));
        assert_eq!(config.run_count(), 2);
    }

    #[test]
    fn test_parse_error_has_location() {
        let err = ConfigParser::new()
            .parse_yaml("suite: [", Some(Path::new("plancheck.yaml")))
            .expect_err("invalid yaml");

        assert!(matches!(
            err,
            PlanCheckError::Config(ConfigError::ParseError { location: Some(_), .. })
        ));
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let nested = temp.path().join("tests/network");
        std::fs::create_dir_all(&nested).expect("create nested dir");
        std::fs::write(temp.path().join("plancheck.yaml"), "suite: {name: x}\nscenarios: []\n")
            .expect("write suite");

        let found = find_config_file(&nested).expect("suite should be found");
        assert_eq!(found, temp.path().join("plancheck.yaml"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let err = ConfigParser::new()
            .load_file(temp.path().join("plancheck.yaml"))
            .expect_err("file is missing");
        assert!(matches!(err, PlanCheckError::Config(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_init_template_is_valid() {
        let config = ConfigParser::new()
            .parse_yaml(include_str!("../../templates/plancheck.yaml"), None)
            .expect("template should parse");

        let result = crate::config::ConfigValidator::new()
            .validate(&config)
            .expect("template should validate");
        assert!(result.warnings.is_empty());

        let names: Vec<_> = config.expand_runs().into_iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec!["network", "security", "root/rsa-key", "root/ed25519-key"]
        );
        assert_eq!(config.defaults.empty_expectations, EmptyExpectationPolicy::Reject);
    }

    #[test]
    fn test_init_template_keys_are_complete() {
        let config = ConfigParser::new()
            .parse_yaml(include_str!("../../templates/plancheck.yaml"), None)
            .expect("template should parse");

        for run in config.expand_runs().into_iter().filter(|r| r.name.starts_with("root/")) {
            let key = run.vars["ssh_public_key"].as_str().expect("key is a string");
            let mut parts = key.split_whitespace();
            let (algorithm, body) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));

            let (prefix, min_len) = match algorithm {
                "ssh-rsa" => ("AAAAB3NzaC1yc2E", 372),
                "ssh-ed25519" => ("AAAAC3NzaC1lZDI1NTE5", 68),
                other => panic!("{}: unexpected key type {other}", run.name),
            };
            assert!(body.starts_with(prefix), "{}: key body does not match its type", run.name);
            assert!(body.len() >= min_len, "{}: key body is truncated", run.name);
            assert_eq!(body.len() % 4, 0, "{}: key body is not padded base64", run.name);
            assert!(
                body.chars().all(|c| c.is_ascii_alphanumeric() || "+/=".contains(c)),
                "{}: key body is not base64",
                run.name
            );
        }
    }
}
