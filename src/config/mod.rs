//! Suite configuration.
//!
//! This module handles all suite-related functionality:
//! - Parsing and deserializing `plancheck.yaml`
//! - Validation of scenarios and expectations
//! - Expanding table-driven cases into runs
//! - Computing run fingerprints

mod hash;
mod parser;
mod spec;
mod validator;

pub use hash::ConfigHasher;
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use spec::{
    CaseConfig, DefaultsConfig, EnvironmentConfig, ScenarioConfig, ScenarioRun, SuiteConfig,
    SuiteSettings, TerraformConfig,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
