//! Planning backend trait definition.
//!
//! This module defines the two operations the harness needs from a planning
//! tool: produce a plan artifact, and render it as a structured plan.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::planner::{PlanRequest, PlanResult};

use super::environment::ProviderEnvironment;

/// Trait for planning backends.
#[async_trait]
pub trait PlanBackend: Send + Sync {
    /// Initializes and plans the request's configuration directory.
    ///
    /// Returns the path of the written plan artifact.
    async fn plan(&self, request: &PlanRequest, env: &ProviderEnvironment) -> Result<PathBuf>;

    /// Renders a plan artifact as a structured plan.
    async fn show(
        &self,
        request: &PlanRequest,
        artifact: &Path,
        env: &ProviderEnvironment,
    ) -> Result<PlanResult>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl<B: PlanBackend + ?Sized> PlanBackend for Arc<B> {
    async fn plan(&self, request: &PlanRequest, env: &ProviderEnvironment) -> Result<PathBuf> {
        (**self).plan(request, env).await
    }

    async fn show(
        &self,
        request: &PlanRequest,
        artifact: &Path,
        env: &ProviderEnvironment,
    ) -> Result<PlanResult> {
        (**self).show(request, artifact, env).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}
