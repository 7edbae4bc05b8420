//! Scenario fingerprints.
//!
//! A fingerprint identifies the inputs of a plan run: the configuration
//! directory and the variables. Two runs with the same fingerprint plan the
//! same thing, so they should reach the same outcome.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::spec::{ScenarioRun, SuiteConfig};

/// Hasher for computing run fingerprints.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of a single run.
    #[must_use]
    pub fn hash_run(&self, run: &ScenarioRun) -> String {
        let mut hasher = Sha256::new();

        hasher.update(run.dir.to_string_lossy().as_bytes());
        hasher.update([0u8]);

        // BTreeMap iteration is sorted, so variable order never matters.
        for (name, value) in &run.vars {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hash_value(&mut hasher, value);
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a fingerprint over every run of a suite.
    #[must_use]
    pub fn hash_suite(&self, config: &SuiteConfig) -> String {
        let mut hasher = Sha256::new();

        hasher.update(config.suite.name.as_bytes());
        for run in config.expand_runs() {
            hasher.update(run.name.as_bytes());
            hasher.update(self.hash_run(&run).as_bytes());
            for resource_type in &run.expect.resource_types {
                hasher.update(resource_type.as_bytes());
            }
        }

        hex::encode(hasher.finalize())
    }

    /// Returns the short form of a fingerprint.
    #[must_use]
    pub fn short(fingerprint: &str) -> &str {
        &fingerprint[..12.min(fingerprint.len())]
    }
}

/// Feeds a JSON value into the hasher with object keys in sorted order.
fn hash_value(hasher: &mut Sha256, value: &Value) {
    match value {
        Value::Null => hasher.update(b"n"),
        Value::Bool(b) => hasher.update(if *b { b"t" } else { b"f" }),
        Value::Number(n) => {
            hasher.update(b"#");
            hasher.update(n.to_string().as_bytes());
        }
        Value::String(s) => {
            hasher.update(b"s");
            hasher.update(s.len().to_be_bytes());
            hasher.update(s.as_bytes());
        }
        Value::Array(items) => {
            hasher.update(b"[");
            hasher.update(items.len().to_be_bytes());
            for item in items {
                hash_value(hasher, item);
            }
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            hasher.update(b"{");
            hasher.update(keys.len().to_be_bytes());
            for key in keys {
                hasher.update(key.as_bytes());
                hasher.update([0u8]);
                hash_value(hasher, &map[key]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{Expectations, Variables};
    use serde_json::json;
    use std::path::PathBuf;

    fn run(vars: Variables) -> ScenarioRun {
        ScenarioRun {
            name: String::from("network"),
            dir: PathBuf::from("modules/network"),
            plan_file: PathBuf::from("network.tfplan"),
            parallel: true,
            vars,
            expect: Expectations::types(["azurerm_subnet"]),
        }
    }

    fn vars(pairs: &[(&str, Value)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let hasher = ConfigHasher::new();
        let a = run(vars(&[("location", json!("westeurope"))]));

        assert_eq!(hasher.hash_run(&a), hasher.hash_run(&a.clone()));
        assert_eq!(hasher.hash_run(&a).len(), 64);
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let hasher = ConfigHasher::new();
        let a = run(vars(&[("tags", json!({"env": "demo", "project": "iac-lab"}))]));
        let b = run(vars(&[("tags", json!({"project": "iac-lab", "env": "demo"}))]));

        assert_eq!(hasher.hash_run(&a), hasher.hash_run(&b));
    }

    #[test]
    fn test_fingerprint_changes_with_values() {
        let hasher = ConfigHasher::new();
        let a = run(vars(&[("ssh_public_key", json!("ssh-rsa AAAA a"))]));
        let b = run(vars(&[("ssh_public_key", json!("ssh-rsa AAAA b"))]));
        let c = ScenarioRun {
            dir: PathBuf::from("modules/security"),
            ..a.clone()
        };

        assert_ne!(hasher.hash_run(&a), hasher.hash_run(&b));
        assert_ne!(hasher.hash_run(&a), hasher.hash_run(&c));
    }

    #[test]
    fn test_short() {
        assert_eq!(ConfigHasher::short("0123456789abcdef"), "0123456789ab");
        assert_eq!(ConfigHasher::short("abc"), "abc");
    }
}
