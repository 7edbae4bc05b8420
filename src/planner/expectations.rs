//! Expectations checked against a rendered plan.
//!
//! Every expectation is evaluated before anything is reported, so a failing
//! plan produces one error that lists all missing resource types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::AssertionError;

use super::plan::PlanResult;

/// What a plan must contain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectations {
    /// Resource types that must appear at least once.
    #[serde(default)]
    pub resource_types: Vec<String>,
    /// Minimum number of resource changes.
    #[serde(default)]
    pub min_changes: Option<usize>,
}

/// Outcome of evaluating expectations against a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpectationReport {
    /// Expected types found in the plan.
    pub matched: Vec<String>,
    /// Expected types absent from the plan.
    pub missing: Vec<String>,
    /// Number of resource changes in the plan.
    pub change_count: usize,
    /// Required minimum number of changes, if any.
    pub min_changes: Option<usize>,
}

impl Expectations {
    /// Creates expectations for a list of resource types.
    #[must_use]
    pub fn types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_types: types.into_iter().map(Into::into).collect(),
            min_changes: None,
        }
    }

    /// Sets the minimum number of resource changes.
    #[must_use]
    pub const fn with_min_changes(mut self, min_changes: usize) -> Self {
        self.min_changes = Some(min_changes);
        self
    }

    /// Returns true if nothing is expected.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.resource_types.is_empty() && self.min_changes.is_none()
    }

    /// Evaluates the expectations without failing.
    #[must_use]
    pub fn evaluate(&self, plan: &PlanResult) -> ExpectationReport {
        let mut seen = BTreeSet::new();
        let mut report = ExpectationReport {
            change_count: plan.change_count(),
            min_changes: self.min_changes,
            ..ExpectationReport::default()
        };

        for expected in &self.resource_types {
            // Duplicates in the expectation list are reported once.
            if !seen.insert(expected.as_str()) {
                continue;
            }
            if plan.has_type(expected) {
                report.matched.push(expected.clone());
            } else {
                debug!("Expected resource type not in plan: {expected}");
                report.missing.push(expected.clone());
            }
        }

        report
    }

    /// Checks the plan, returning an aggregated error when anything is unmet.
    ///
    /// # Errors
    ///
    /// Returns an [`AssertionError`] naming every unmet expectation.
    pub fn check(&self, plan: &PlanResult) -> Result<ExpectationReport, AssertionError> {
        let report = self.evaluate(plan);
        match report.failure(plan) {
            Some(failure) => Err(failure),
            None => Ok(report),
        }
    }
}

impl ExpectationReport {
    /// Returns true if every expectation was met.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.missing.is_empty() && !self.too_few_changes()
    }

    fn too_few_changes(&self) -> bool {
        self.min_changes.is_some_and(|min| self.change_count < min)
    }

    fn failure(&self, plan: &PlanResult) -> Option<AssertionError> {
        let mut failures = Vec::new();

        if !self.missing.is_empty() {
            failures.push(AssertionError::MissingResourceTypes {
                missing: self.missing.clone(),
                planned: plan.resource_types().into_iter().map(String::from).collect(),
            });
        }

        if let Some(minimum) = self.min_changes
            && self.change_count < minimum
        {
            failures.push(AssertionError::TooFewChanges {
                minimum,
                actual: self.change_count,
            });
        }

        AssertionError::aggregate(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan::{Change, ChangeAction, ResourceChange, ResourceMode};

    fn plan_with(types: &[&str]) -> PlanResult {
        let mut plan = PlanResult {
            format_version: String::from("1.2"),
            ..PlanResult::default()
        };
        for (i, ty) in types.iter().enumerate() {
            let address = format!("{ty}.r{i}");
            plan.resource_changes.insert(
                address.clone(),
                ResourceChange {
                    address,
                    module_address: None,
                    mode: ResourceMode::Managed,
                    resource_type: (*ty).to_string(),
                    name: format!("r{i}"),
                    provider_name: None,
                    change: Change {
                        actions: vec![ChangeAction::Create],
                    },
                },
            );
        }
        plan
    }

    #[test]
    fn test_all_types_present() {
        let plan = plan_with(&["azurerm_virtual_network", "azurerm_subnet", "azurerm_public_ip"]);
        let expectations =
            Expectations::types(["azurerm_virtual_network", "azurerm_subnet", "azurerm_public_ip"]);

        let report = expectations.check(&plan).expect("all types should be present");
        assert_eq!(report.matched.len(), 3);
        assert!(report.passed());
    }

    #[test]
    fn test_reports_every_missing_type() {
        let plan = plan_with(&["azurerm_virtual_network"]);
        let expectations =
            Expectations::types(["azurerm_virtual_network", "azurerm_subnet", "azurerm_public_ip"]);

        let err = expectations.check(&plan).expect_err("two types are missing");
        assert_eq!(err.missing_types(), vec!["azurerm_subnet", "azurerm_public_ip"]);
    }

    #[test]
    fn test_duplicate_expectations_counted_once() {
        let plan = plan_with(&["azurerm_subnet"]);
        let report = Expectations::types(["azurerm_subnet", "azurerm_subnet"]).evaluate(&plan);
        assert_eq!(report.matched, vec![String::from("azurerm_subnet")]);
    }

    #[test]
    fn test_min_changes() {
        let empty = plan_with(&[]);
        let expectations = Expectations::default().with_min_changes(1);

        let err = expectations.check(&empty).expect_err("no changes planned");
        assert!(matches!(err, AssertionError::TooFewChanges { minimum: 1, actual: 0 }));

        let plan = plan_with(&["azurerm_resource_group"]);
        assert!(expectations.check(&plan).is_ok());
    }

    #[test]
    fn test_missing_types_and_min_changes_aggregate() {
        let plan = plan_with(&["azurerm_network_security_group"]);
        let expectations = Expectations::types([
            "azurerm_network_security_group",
            "azurerm_network_security_rule",
        ])
        .with_min_changes(2);

        let err = expectations.check(&plan).expect_err("rule missing and too few changes");
        assert!(matches!(err, AssertionError::Multiple(ref f) if f.len() == 2));
        assert_eq!(err.missing_types(), vec!["azurerm_network_security_rule"]);
    }

    #[test]
    fn test_empty_expectations_pass() {
        let plan = plan_with(&[]);
        let expectations = Expectations::default();
        assert!(expectations.is_empty());
        assert!(expectations.check(&plan).is_ok());
    }
}
