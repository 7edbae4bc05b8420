//! Error types for plancheck.
//!
//! Failures are split by the stage that produced them: loading the suite
//! file, setting up a plan run, executing the planning tool, and checking the
//! resulting plan against expectations. Setup and execution failures abort a
//! run immediately; assertion failures are aggregated so that a single report
//! names everything that was missing.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// The main error type for plancheck.
#[derive(Debug, Error)]
pub enum PlanCheckError {
    /// Suite configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The plan run could not be prepared.
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    /// The planning tool failed while planning or rendering.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// The plan did not meet its expectations.
    #[error("Assertion failed: {0}")]
    Assertion(#[from] AssertionError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Suite configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The suite file was not found.
    #[error("Suite file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The suite file could not be parsed.
    #[error("Failed to parse suite file: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Suite validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A required environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// No scenario matched a name filter.
    #[error("No scenario named '{name}' in suite")]
    UnknownScenario {
        /// The requested scenario name.
        name: String,
    },
}

/// Errors raised before the planning tool produced a plan.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The configuration directory does not exist.
    #[error("Configuration directory not found: {path}")]
    ConfigDirMissing {
        /// Path to the missing directory.
        path: PathBuf,
    },

    /// The configuration directory has no `.tf` or `.tf.json` files.
    #[error("No configuration files in directory: {path}")]
    NoConfigurationFiles {
        /// Path to the empty directory.
        path: PathBuf,
    },

    /// The planning tool binary could not be started.
    #[error("Planning tool '{binary}' is unavailable: {message}")]
    BinaryUnavailable {
        /// Binary that was invoked.
        binary: String,
        /// Description of the spawn failure.
        message: String,
    },

    /// `init` exited unsuccessfully.
    #[error("Initialization failed in {dir} (exit code {exit_code:?}): {stderr}")]
    InitFailed {
        /// Directory that was initialized.
        dir: PathBuf,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Diagnostic output from the tool.
        stderr: String,
    },

    /// Variables could not be written for the tool.
    #[error("Failed to write variables file {path}: {message}")]
    VariablesFile {
        /// Path of the variables file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// An isolated workspace could not be prepared.
    #[error("Failed to prepare workspace {path}: {message}")]
    Workspace {
        /// Path of the workspace.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The expectation set was empty and empty sets are rejected.
    #[error("No expected resource types were given")]
    EmptyExpectations,
}

/// Errors raised by the planning tool after initialization.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// `plan` exited unsuccessfully.
    #[error("Plan failed in {dir} (exit code {exit_code:?}): {stderr}")]
    PlanFailed {
        /// Directory that was planned.
        dir: PathBuf,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Diagnostic output from the tool.
        stderr: String,
    },

    /// `show` exited unsuccessfully.
    #[error("Rendering plan {artifact} failed (exit code {exit_code:?}): {stderr}")]
    ShowFailed {
        /// Plan artifact that was rendered.
        artifact: PathBuf,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Diagnostic output from the tool.
        stderr: String,
    },

    /// The rendered plan could not be parsed.
    #[error("Malformed plan output: {message}")]
    MalformedPlan {
        /// Description of the parse failure.
        message: String,
    },

    /// The tool reported the plan as errored.
    #[error("Plan for {dir} is marked as errored")]
    ErroredPlan {
        /// Directory that was planned.
        dir: PathBuf,
    },
}

/// Expectation failures against a successfully rendered plan.
#[derive(Debug, Error)]
pub enum AssertionError {
    /// One or more expected resource types are absent.
    #[error("plan is missing expected resource types: {}", .missing.join(", "))]
    MissingResourceTypes {
        /// Every expected type that was not found.
        missing: Vec<String>,
        /// Types that the plan did contain.
        planned: Vec<String>,
    },

    /// The plan has fewer resource changes than required.
    #[error("plan has {actual} resource changes, expected at least {minimum}")]
    TooFewChanges {
        /// Required minimum.
        minimum: usize,
        /// Number of changes in the plan.
        actual: usize,
    },

    /// Several expectations failed at once.
    #[error("{}", join_failures(.0))]
    Multiple(Vec<AssertionError>),
}

/// Coarse classification of a failure, used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Suite configuration problem.
    Config,
    /// Run could not be prepared.
    Setup,
    /// Planning tool failed.
    Execution,
    /// Plan did not meet expectations.
    Assertion,
    /// Anything else.
    Internal,
}

/// Result type alias for plancheck operations.
pub type Result<T> = std::result::Result<T, PlanCheckError>;

fn join_failures(failures: &[AssertionError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PlanCheckError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns the failure classification of this error.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Config(_) => FailureKind::Config,
            Self::Setup(_) => FailureKind::Setup,
            Self::Execution(_) => FailureKind::Execution,
            Self::Assertion(_) => FailureKind::Assertion,
            Self::Io(_) | Self::Internal(_) => FailureKind::Internal,
        }
    }

    /// Returns true if the error aborted the run before assertions were checked.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Assertion(_))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl SetupError {
    /// Creates a workspace error.
    #[must_use]
    pub fn workspace(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Workspace {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl ExecutionError {
    /// Creates a malformed plan error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPlan {
            message: message.into(),
        }
    }
}

impl AssertionError {
    /// Collapses a list of failures into a single error.
    ///
    /// Returns `None` when the list is empty.
    #[must_use]
    pub fn aggregate(mut failures: Vec<Self>) -> Option<Self> {
        match failures.len() {
            0 => None,
            1 => failures.pop(),
            _ => Some(Self::Multiple(failures)),
        }
    }

    /// Returns every missing resource type named by this failure.
    #[must_use]
    pub fn missing_types(&self) -> Vec<&str> {
        match self {
            Self::MissingResourceTypes { missing, .. } => {
                missing.iter().map(String::as_str).collect()
            }
            Self::TooFewChanges { .. } => Vec::new(),
            Self::Multiple(failures) => failures.iter().flat_map(Self::missing_types).collect(),
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Setup => "setup",
            Self::Execution => "execution",
            Self::Assertion => "assertion",
            Self::Internal => "internal",
        };
        write!(f, "{s}")
    }
}
