//! Structured plan types.
//!
//! This module defines the typed view of the JSON document produced by
//! `terraform show -json <plan>`. Only the parts needed for assertions are
//! modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ExecutionError, Result};

/// A rendered plan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlanResult {
    /// Plan JSON format version.
    pub format_version: String,
    /// Version of the tool that produced the plan.
    pub terraform_version: Option<String>,
    /// Whether the tool marked the plan as errored.
    pub errored: bool,
    /// Resource changes keyed by resource address.
    pub resource_changes: BTreeMap<String, ResourceChange>,
}

/// A single proposed change to one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    /// Full resource address (e.g. `module.net.azurerm_subnet.this`).
    pub address: String,
    /// Address of the containing module, if any.
    #[serde(default)]
    pub module_address: Option<String>,
    /// Managed resource or data source.
    #[serde(default)]
    pub mode: ResourceMode,
    /// Resource type identifier (e.g. `azurerm_subnet`).
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource name within its module.
    pub name: String,
    /// Provider that owns the resource.
    #[serde(default)]
    pub provider_name: Option<String>,
    /// The proposed change.
    pub change: Change,
}

/// The change block of a resource change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Raw action list as emitted by the tool.
    pub actions: Vec<ChangeAction>,
}

/// Resource mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    /// A managed resource.
    #[default]
    Managed,
    /// A data source.
    Data,
}

/// A single raw action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeAction {
    /// Nothing changes.
    NoOp,
    /// The object is created.
    Create,
    /// A data source is read.
    Read,
    /// The object is updated in place.
    Update,
    /// The object is destroyed.
    Delete,
    /// The object is removed from state without being destroyed.
    Forget,
    /// An action this crate does not know about.
    #[serde(other)]
    Unknown,
}

/// Action kind derived from an action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// No change.
    NoOp,
    /// Create.
    Create,
    /// Read (data sources).
    Read,
    /// In-place update.
    Update,
    /// Destroy.
    Delete,
    /// Destroy and re-create, in either order.
    Replace,
    /// Removed from state, the real object is left alone.
    Forget,
    /// An action list this crate does not recognize.
    Unknown,
}

/// Counts of changes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    /// Objects to create.
    pub create: usize,
    /// Objects to update in place.
    pub update: usize,
    /// Objects to replace.
    pub replace: usize,
    /// Objects to destroy.
    pub delete: usize,
    /// Data sources to read.
    pub read: usize,
    /// Unchanged objects.
    pub no_op: usize,
    /// Objects removed from state only.
    pub forget: usize,
    /// Changes with an unrecognized action list.
    pub unknown: usize,
}

/// Wire shape of the `show -json` document.
#[derive(Debug, Deserialize)]
struct RawPlan {
    #[serde(default)]
    format_version: String,
    #[serde(default)]
    terraform_version: Option<String>,
    #[serde(default)]
    errored: bool,
    #[serde(default)]
    resource_changes: Vec<ResourceChange>,
}

impl PlanResult {
    /// Parses the output of `terraform show -json`.
    ///
    /// # Errors
    ///
    /// Returns an execution error if the document is not a valid plan.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let raw: RawPlan = serde_json::from_slice(bytes)
            .map_err(|e| ExecutionError::malformed(format!("invalid plan JSON: {e}")))?;

        if raw.format_version.is_empty() {
            return Err(ExecutionError::malformed("missing format_version").into());
        }

        let resource_changes = raw
            .resource_changes
            .into_iter()
            .map(|rc| (rc.address.clone(), rc))
            .collect();

        Ok(Self {
            format_version: raw.format_version,
            terraform_version: raw.terraform_version,
            errored: raw.errored,
            resource_changes,
        })
    }

    /// Returns true if at least one change has the given resource type.
    #[must_use]
    pub fn has_type(&self, resource_type: &str) -> bool {
        self.resource_changes
            .values()
            .any(|rc| rc.resource_type == resource_type)
    }

    /// Returns the distinct resource types present in the plan.
    #[must_use]
    pub fn resource_types(&self) -> BTreeSet<&str> {
        self.resource_changes
            .values()
            .map(|rc| rc.resource_type.as_str())
            .collect()
    }

    /// Returns the number of resource changes.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.resource_changes.len()
    }

    /// Returns true if the plan has no resource changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resource_changes.is_empty()
    }

    /// Summarizes the plan by action kind.
    #[must_use]
    pub fn summary(&self) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        for rc in self.resource_changes.values() {
            match rc.kind() {
                ActionKind::NoOp => summary.no_op += 1,
                ActionKind::Create => summary.create += 1,
                ActionKind::Read => summary.read += 1,
                ActionKind::Update => summary.update += 1,
                ActionKind::Delete => summary.delete += 1,
                ActionKind::Replace => summary.replace += 1,
                ActionKind::Forget => summary.forget += 1,
                ActionKind::Unknown => summary.unknown += 1,
            }
        }
        summary
    }
}

impl ResourceChange {
    /// Derives the action kind from the raw action list.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self.change.actions.as_slice() {
            [ChangeAction::NoOp] => ActionKind::NoOp,
            [ChangeAction::Create] | [ChangeAction::Create, ChangeAction::Forget] => {
                ActionKind::Create
            }
            [ChangeAction::Read] => ActionKind::Read,
            [ChangeAction::Update] => ActionKind::Update,
            [ChangeAction::Delete] => ActionKind::Delete,
            [ChangeAction::Delete, ChangeAction::Create]
            | [ChangeAction::Create, ChangeAction::Delete] => ActionKind::Replace,
            [ChangeAction::Forget] => ActionKind::Forget,
            _ => ActionKind::Unknown,
        }
    }

    /// Returns true if this change is for a data source.
    #[must_use]
    pub fn is_data_source(&self) -> bool {
        self.mode == ResourceMode::Data
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Replace => "replace",
            Self::Forget => "forget",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to add, {} to change, {} to destroy",
            self.create + self.replace,
            self.update,
            self.delete + self.replace
        )?;
        if self.forget > 0 {
            write!(f, ", {} to forget", self.forget)?;
        }
        if self.unknown > 0 {
            write!(f, ", {} unrecognized", self.unknown)?;
        }
        Ok(())
    }
}
