//! Isolated workspaces for plan runs.
//!
//! The planning tool keeps local state next to the configuration
//! (`.terraform/`, lock files, plan artifacts). Runs that share a directory
//! would trample each other, so each isolated run plans inside its own copy
//! of the suite root under a scratch directory.

mod run_id;

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{PlanCheckError, Result, SetupError};

pub use run_id::generate_run_id;

/// Directory names never copied into a workspace.
const SKIPPED_DIRS: &[&str] = &[".terraform", ".git", ".plancheck"];

/// File suffixes never copied into a workspace.
const SKIPPED_SUFFIXES: &[&str] = &[".tfstate", ".tfstate.backup", ".tfplan", ".tfstate.lock.info"];

/// A directory a run plans in.
#[derive(Debug)]
pub struct Workspace {
    /// Root of the workspace (a copy of the suite root, or the suite root).
    root: PathBuf,
    /// Whether the workspace was created for this run and may be removed.
    owned: bool,
}

impl Workspace {
    /// Uses the suite root directly, without copying.
    #[must_use]
    pub fn in_place(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            owned: false,
        }
    }

    /// Copies `source` into `<scratch>/<run_id>/<slug>` and returns it.
    ///
    /// # Errors
    ///
    /// Returns a setup error if the source is missing or the copy fails.
    pub async fn prepare(source: &Path, scratch: &Path, run_id: &str, slug: &str) -> Result<Self> {
        let root = scratch.join(run_id).join(slug);
        info!("Preparing workspace {}", root.display());

        let source = tokio::fs::canonicalize(source)
            .await
            .map_err(|e| SetupError::workspace(source, format!("source unavailable: {e}")))?;

        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| SetupError::workspace(&root, e.to_string()))?;

        // The scratch directory may live inside the source tree.
        let exclude = tokio::fs::canonicalize(scratch)
            .await
            .map_err(|e| SetupError::workspace(scratch, e.to_string()))?;

        let destination = root.clone();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&source, &destination, &exclude))
            .await
            .map_err(|e| PlanCheckError::internal(format!("workspace copy task failed: {e}")))?
            .map_err(|e| SetupError::workspace(&root, e.to_string()))?;

        debug!("Copied {copied} file(s) into {}", root.display());
        Ok(Self { root, owned: true })
    }

    /// Returns the workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if the workspace is a copy made for this run.
    #[must_use]
    pub const fn is_isolated(&self) -> bool {
        self.owned
    }

    /// Removes the workspace if it was created for this run.
    pub async fn cleanup(self) {
        if !self.owned {
            return;
        }
        debug!("Removing workspace {}", self.root.display());
        if let Err(e) = tokio::fs::remove_dir_all(&self.root).await {
            warn!("Failed to remove workspace {}: {e}", self.root.display());
        }
    }
}

/// Recursively copies `source` into `destination`, returning the file count.
fn copy_tree(source: &Path, destination: &Path, exclude: &Path) -> std::io::Result<usize> {
    let mut copied = 0;
    std::fs::create_dir_all(destination)?;

    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        // Follows symlinks, so linked modules are copied as real files.
        let metadata = std::fs::metadata(&path)?;

        if metadata.is_dir() {
            if SKIPPED_DIRS.contains(&name.as_str()) || path == exclude {
                continue;
            }
            copied += copy_tree(&path, &destination.join(&name), exclude)?;
        } else if !is_skipped_file(&name) {
            std::fs::copy(&path, destination.join(&name))?;
            copied += 1;
        }
    }

    Ok(copied)
}

fn is_skipped_file(name: &str) -> bool {
    SKIPPED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}
