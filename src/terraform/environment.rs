//! Provider environment passed to the planning tool.
//!
//! Credentials are resolved once, outside the harness, and handed in as a
//! [`ProviderEnvironment`]. Values are never printed.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ConfigError, Result};

/// Resolved environment variables for the planning tool's child processes.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderEnvironment {
    vars: BTreeMap<String, String>,
}

impl ProviderEnvironment {
    /// Creates an empty environment.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vars: BTreeMap::new(),
        }
    }

    /// Adds a variable.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a variable, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Builds an environment from a snapshot of variables.
    ///
    /// Variables whose name starts with one of `prefixes` are kept, as are
    /// the variables named in `required`. Every name in `required` must be
    /// present in the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first required variable that is absent.
    pub fn from_snapshot<I>(snapshot: I, prefixes: &[String], required: &[String]) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let snapshot: BTreeMap<String, String> = snapshot.into_iter().collect();
        let mut env = Self::new();

        for (name, value) in &snapshot {
            if prefixes.iter().any(|p| name.starts_with(p.as_str())) {
                env.insert(name.clone(), value.clone());
            }
        }

        for name in required {
            let value = snapshot.get(name).ok_or_else(|| ConfigError::MissingEnvVar {
                name: name.clone(),
            })?;
            env.insert(name.clone(), value.clone());
        }

        Ok(env)
    }

    /// Returns the value of a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Iterates over all variables.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the variable names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.vars.keys().map(String::as_str).collect()
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns true if no variables are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl fmt::Debug for ProviderEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.vars.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}
