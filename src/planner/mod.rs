//! Plan model and expectation checks.
//!
//! This module holds the request sent to a planning backend, the structured
//! plan it returns, and the expectations evaluated against that plan.

mod expectations;
mod plan;
mod request;

pub use expectations::{ExpectationReport, Expectations};
pub use plan::{ActionKind, Change, ChangeAction, ChangeSummary, PlanResult, ResourceChange, ResourceMode};
pub use request::{DEFAULT_PLAN_FILE, PlanRequest, VARS_EXTENSION, Variables};
