//! Suite runner.
//!
//! This module runs every expanded scenario of a suite through the plan
//! harness. Serial scenarios run first, one at a time, in declaration order;
//! parallel scenarios then run concurrently, bounded by the configured
//! parallelism. Each run gets its own workspace and plan artifact, so runs
//! share no mutable state. Without isolated workspaces, runs that plan the
//! same directory are moved into the serial group.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigHasher, DefaultsConfig, ScenarioRun};
use crate::error::{ConfigError, FailureKind, PlanCheckError, Result};
use crate::harness::{PlanHarness, PlanOutcome};
use crate::planner::ChangeSummary;
use crate::terraform::PlanBackend;
use crate::workspace::{Workspace, generate_run_id};

/// Options controlling a suite run.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Maximum number of concurrent parallel runs.
    pub parallelism: usize,
    /// Plan each run in its own copy of the suite root.
    pub isolate_workspaces: bool,
    /// Keep workspaces after each run.
    pub keep_workspaces: bool,
    /// Skip runs that have not started once one run fails.
    pub fail_fast: bool,
    /// Directory under which workspaces are created.
    pub scratch_dir: PathBuf,
}

/// Runner executing scenario runs against a harness.
pub struct SuiteRunner<B: PlanBackend + 'static> {
    /// Shared harness.
    harness: Arc<PlanHarness<B>>,
    /// Suite root directory.
    root: PathBuf,
    /// Run options.
    options: RunnerOptions,
    /// Identifier of this suite run.
    run_id: String,
}

/// Status of a single scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every expectation was met.
    Passed,
    /// Setup, execution or assertion failed.
    Failed,
    /// Not started because of fail-fast.
    Skipped,
}

/// Result of a single scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Run name.
    pub name: String,
    /// Fingerprint of the run's inputs.
    pub fingerprint: String,
    /// Outcome.
    pub status: RunStatus,
    /// Failure classification, if failed.
    pub failure_kind: Option<FailureKind>,
    /// Failure message, if failed.
    pub message: Option<String>,
    /// Expected types found in the plan.
    pub matched_types: Vec<String>,
    /// Expected types missing from the plan.
    pub missing_types: Vec<String>,
    /// Change counts, if a plan was produced and passed.
    pub summary: Option<ChangeSummary>,
    /// Workspace kept on disk, if any.
    pub workspace: Option<PathBuf>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Aggregated result of a suite run.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteReport {
    /// Suite name.
    pub suite: String,
    /// Run identifier.
    pub run_id: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-run results, serial runs first, each group in declaration order.
    pub results: Vec<ScenarioResult>,
}

impl RunnerOptions {
    /// Builds options from suite defaults.
    #[must_use]
    pub fn from_defaults(defaults: &DefaultsConfig, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            parallelism: defaults.parallelism,
            isolate_workspaces: defaults.isolate_workspaces,
            keep_workspaces: defaults.keep_workspaces,
            fail_fast: false,
            scratch_dir: scratch_dir.into(),
        }
    }
}

impl<B: PlanBackend + 'static> SuiteRunner<B> {
    /// Creates a new runner.
    #[must_use]
    pub fn new(harness: PlanHarness<B>, root: impl Into<PathBuf>, options: RunnerOptions) -> Self {
        Self {
            harness: Arc::new(harness),
            root: root.into(),
            options,
            run_id: generate_run_id(),
        }
    }

    /// Returns the identifier of this suite run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Runs every scenario run and returns the aggregated report.
    pub async fn run(&self, suite: &str, runs: Vec<ScenarioRun>) -> SuiteReport {
        let started_at = Utc::now();
        let shared = if self.options.isolate_workspaces {
            HashSet::new()
        } else {
            shared_dirs(&runs)
        };
        let (serial, parallel): (Vec<_>, Vec<_>) = runs.into_iter().partition(|r| {
            if r.parallel && shared.contains(&r.dir) {
                warn!(
                    "Running '{}' serially: {} is planned in place by other runs",
                    r.name,
                    r.dir.display()
                );
                return true;
            }
            !r.parallel
        });

        info!(
            "Starting suite '{suite}' ({} serial, {} parallel run(s), run id {})",
            serial.len(),
            parallel.len(),
            self.run_id
        );

        let failed = Arc::new(AtomicBool::new(false));
        let mut results = Vec::with_capacity(serial.len() + parallel.len());

        for run in serial {
            let result = self.run_guarded(run, &failed).await;
            results.push(result);
        }

        results.extend(self.run_parallel(parallel, &failed).await);

        let report = SuiteReport {
            suite: suite.to_string(),
            run_id: self.run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            results,
        };

        info!(
            "Suite '{suite}' finished: {} passed, {} failed, {} skipped",
            report.passed_count(),
            report.failed_count(),
            report.skipped_count()
        );

        report
    }

    /// Runs the parallel group under the concurrency bound.
    async fn run_parallel(
        &self,
        runs: Vec<ScenarioRun>,
        failed: &Arc<AtomicBool>,
    ) -> Vec<ScenarioResult> {
        let semaphore = Arc::new(Semaphore::new(self.options.parallelism.max(1)));
        let mut handles = Vec::with_capacity(runs.len());

        for run in runs {
            let name = run.name.clone();
            let fingerprint = ConfigHasher::new().hash_run(&run);
            let context = self.context();
            let semaphore = Arc::clone(&semaphore);
            let failed = Arc::clone(failed);

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return ScenarioResult::skipped(&run, ConfigHasher::new().hash_run(&run));
                };
                context.run_guarded(run, &failed).await
            });
            handles.push((name, fingerprint, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, fingerprint, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!("Run '{name}' task failed: {e}");
                    failed.store(true, Ordering::SeqCst);
                    results.push(ScenarioResult::failed_with(
                        name,
                        fingerprint,
                        &PlanCheckError::internal(format!("run task failed: {e}")),
                        0,
                    ));
                }
            }
        }
        results
    }

    /// Runs one serial run, honoring fail-fast.
    async fn run_guarded(&self, run: ScenarioRun, failed: &AtomicBool) -> ScenarioResult {
        self.context().run_guarded(run, failed).await
    }

    /// Returns an owned copy of what a run needs.
    fn context(&self) -> RunContext<B> {
        RunContext {
            harness: Arc::clone(&self.harness),
            root: self.root.clone(),
            options: self.options.clone(),
            run_id: self.run_id.clone(),
        }
    }
}

/// Everything a single run needs, owned so it can move into a task.
struct RunContext<B: PlanBackend + 'static> {
    harness: Arc<PlanHarness<B>>,
    root: PathBuf,
    options: RunnerOptions,
    run_id: String,
}

impl<B: PlanBackend + 'static> RunContext<B> {
    async fn run_guarded(&self, run: ScenarioRun, failed: &AtomicBool) -> ScenarioResult {
        let fingerprint = ConfigHasher::new().hash_run(&run);

        if self.options.fail_fast && failed.load(Ordering::SeqCst) {
            debug!("Skipping '{}' after an earlier failure", run.name);
            return ScenarioResult::skipped(&run, fingerprint);
        }

        let result = self.run_one(&run, fingerprint).await;
        if result.status == RunStatus::Failed {
            failed.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn run_one(&self, run: &ScenarioRun, fingerprint: String) -> ScenarioResult {
        let started = Instant::now();
        info!("Running '{}' ({})", run.name, ConfigHasher::short(&fingerprint));

        let workspace = if self.options.isolate_workspaces {
            match Workspace::prepare(
                &self.root,
                &self.options.scratch_dir,
                &self.run_id,
                &run.slug(),
            )
            .await
            {
                Ok(ws) => ws,
                Err(e) => {
                    error!("Run '{}' setup failed: {e}", run.name);
                    return ScenarioResult::failed_with(
                        run.name.clone(),
                        fingerprint,
                        &e,
                        elapsed_ms(started),
                    );
                }
            }
        } else {
            Workspace::in_place(&self.root)
        };

        let request = run.request(workspace.root());
        let outcome = self.harness.run_with_expectations(&request, &run.expect).await;
        let duration_ms = elapsed_ms(started);

        let mut result = match outcome {
            Ok(outcome) => {
                info!("Run '{}' passed in {duration_ms}ms", run.name);
                ScenarioResult::passed(run, fingerprint, &outcome, duration_ms)
            }
            Err(e) => {
                match e.kind() {
                    FailureKind::Assertion => warn!("Run '{}' failed: {e}", run.name),
                    _ => error!("Run '{}' aborted: {e}", run.name),
                }
                ScenarioResult::failed_with(run.name.clone(), fingerprint, &e, duration_ms)
            }
        };

        if self.options.keep_workspaces && workspace.is_isolated() {
            info!("Keeping workspace {}", workspace.root().display());
            result.workspace = Some(workspace.root().to_path_buf());
        } else {
            workspace.cleanup().await;
        }

        result
    }
}

/// Selects the runs matching a list of scenario names.
///
/// A name matches a run by its full name or by its scenario, so `root`
/// selects every case of `root`. An empty filter selects everything.
///
/// # Errors
///
/// Returns a config error naming the first filter entry that matched nothing.
pub fn select_runs(runs: Vec<ScenarioRun>, names: &[String]) -> Result<Vec<ScenarioRun>> {
    if names.is_empty() {
        return Ok(runs);
    }

    let matches = |run: &ScenarioRun, name: &str| {
        run.name == name
            || run
                .name
                .strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('/'))
    };

    if let Some(unknown) = names.iter().find(|n| !runs.iter().any(|r| matches(r, n.as_str()))) {
        return Err(ConfigError::UnknownScenario {
            name: unknown.clone(),
        }
        .into());
    }

    Ok(runs
        .into_iter()
        .filter(|run| names.iter().any(|n| matches(run, n.as_str())))
        .collect())
}

/// Returns the directories planned by more than one run.
fn shared_dirs(runs: &[ScenarioRun]) -> HashSet<PathBuf> {
    let mut counts: HashMap<&Path, usize> = HashMap::new();
    for run in runs {
        *counts.entry(run.dir.as_path()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(dir, _)| dir.to_path_buf())
        .collect()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl ScenarioResult {
    fn passed(run: &ScenarioRun, fingerprint: String, outcome: &PlanOutcome, duration_ms: u64) -> Self {
        Self {
            name: run.name.clone(),
            fingerprint,
            status: RunStatus::Passed,
            failure_kind: None,
            message: None,
            matched_types: outcome.report.matched.clone(),
            missing_types: Vec::new(),
            summary: Some(outcome.summary),
            workspace: None,
            duration_ms,
        }
    }

    fn failed_with(name: String, fingerprint: String, err: &PlanCheckError, duration_ms: u64) -> Self {
        let missing_types = match err {
            PlanCheckError::Assertion(failure) => {
                failure.missing_types().into_iter().map(String::from).collect()
            }
            _ => Vec::new(),
        };

        Self {
            name,
            fingerprint,
            status: RunStatus::Failed,
            failure_kind: Some(err.kind()),
            message: Some(err.to_string()),
            matched_types: Vec::new(),
            missing_types,
            summary: None,
            workspace: None,
            duration_ms,
        }
    }

    fn skipped(run: &ScenarioRun, fingerprint: String) -> Self {
        Self {
            name: run.name.clone(),
            fingerprint,
            status: RunStatus::Skipped,
            failure_kind: None,
            message: None,
            matched_types: Vec::new(),
            missing_types: Vec::new(),
            summary: None,
            workspace: None,
            duration_ms: 0,
        }
    }
}

impl SuiteReport {
    /// Returns true if every run passed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.results.iter().all(|r| r.status == RunStatus::Passed)
    }

    /// Returns the number of passed runs.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(RunStatus::Passed)
    }

    /// Returns the number of failed runs.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(RunStatus::Failed)
    }

    /// Returns the number of skipped runs.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(RunStatus::Skipped)
    }

    /// Returns the result for a run by name.
    #[must_use]
    pub fn result(&self, name: &str) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == name)
    }

    fn count(&self, status: RunStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Writes the report as JSON to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized or written.
    pub async fn write_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)
            .map_err(|e| PlanCheckError::internal(format!("Failed to serialize report: {e}")))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;
        info!("Wrote report to {}", path.display());
        Ok(())
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}
