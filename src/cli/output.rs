//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ConfigHasher, ScenarioRun, SuiteConfig, ValidationResult};
use crate::planner::{ChangeSummary, ExpectationReport};
use crate::runner::{RunStatus, SuiteReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Run result row for table display.
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Run")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Changes")]
    changes: String,
    #[tabled(rename = "Missing")]
    missing: String,
    #[tabled(rename = "Time")]
    duration: String,
}

/// Expanded run row for table display.
#[derive(Tabled)]
struct RunRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Run")]
    name: String,
    #[tabled(rename = "Directory")]
    dir: String,
    #[tabled(rename = "Plan file")]
    plan_file: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Expected types")]
    expected: String,
    #[tabled(rename = "Fingerprint")]
    fingerprint: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Returns true if the formatter emits JSON.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Formats a suite report for display.
    #[must_use]
    pub fn format_report(&self, report: &SuiteReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats a report as text.
    fn format_report_text(report: &SuiteReport) -> String {
        let mut output = String::new();

        let _ = write!(output, "\nSuite: {} (run {})\n\n", report.suite, report.run_id);

        if report.results.is_empty() {
            output.push_str("   No runs selected.\n");
            return output;
        }

        let rows: Vec<ResultRow> = report
            .results
            .iter()
            .map(|r| ResultRow {
                name: r.name.clone(),
                status: Self::format_status(r.status),
                changes: r.summary.map_or_else(|| String::from("-"), |s| s.to_string()),
                missing: if r.missing_types.is_empty() {
                    String::from("-")
                } else {
                    r.missing_types.join(", ")
                },
                duration: format!("{:.1}s", seconds(r.duration_ms)),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let failures: Vec<_> = report
            .results
            .iter()
            .filter(|r| r.status == RunStatus::Failed)
            .collect();
        if !failures.is_empty() {
            let _ = write!(output, "\n{} Failures:\n", "✗".red());
            for result in failures {
                let kind = result
                    .failure_kind
                    .map_or_else(String::new, |k| format!("[{k}] "));
                let message = result.message.as_deref().unwrap_or("unknown failure");
                let _ = writeln!(output, "   - {}: {kind}{message}", result.name);
            }
        }

        let kept: Vec<_> = report.results.iter().filter_map(|r| r.workspace.as_ref()).collect();
        if !kept.is_empty() {
            output.push_str("\nKept workspaces:\n");
            for path in kept {
                let _ = writeln!(output, "   {}", path.display());
            }
        }

        let verdict = if report.success() {
            "PASSED".green().to_string()
        } else {
            "FAILED".red().to_string()
        };
        let _ = write!(
            output,
            "\nResult: {verdict} ({} passed, {} failed, {} skipped)\n",
            report.passed_count(),
            report.failed_count(),
            report.skipped_count()
        );

        output
    }

    /// Formats the expanded runs of a suite.
    #[must_use]
    pub fn format_runs(&self, runs: &[ScenarioRun]) -> String {
        let hasher = ConfigHasher::new();
        match self.format {
            OutputFormat::Json => {
                let json: Vec<RunJson> = runs
                    .iter()
                    .map(|r| RunJson {
                        name: r.name.clone(),
                        dir: r.dir.display().to_string(),
                        plan_file: r.plan_file.display().to_string(),
                        parallel: r.parallel,
                        expected_types: r.expect.resource_types.clone(),
                        min_changes: r.expect.min_changes,
                        fingerprint: hasher.hash_run(r),
                    })
                    .collect();
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                if runs.is_empty() {
                    return String::from("No scenarios defined.\n");
                }
                let rows: Vec<RunRow> = runs
                    .iter()
                    .enumerate()
                    .map(|(i, r)| RunRow {
                        index: i + 1,
                        name: r.name.clone(),
                        dir: r.dir.display().to_string(),
                        plan_file: r.plan_file.display().to_string(),
                        mode: if r.parallel { "parallel" } else { "serial" }.to_string(),
                        expected: Self::truncate(&r.expect.resource_types.join(", "), 60),
                        fingerprint: ConfigHasher::short(&hasher.hash_run(r)).to_string(),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats a validation result with a short suite summary.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &SuiteConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "suite": config.suite.name,
                    "scenarios": config.scenarios.len(),
                    "runs": config.run_count(),
                    "fingerprint": ConfigHasher::new().hash_suite(config),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();

                if result.is_valid() {
                    let _ = writeln!(output, "{} Suite is valid!", "✓".green());
                } else {
                    let _ = writeln!(
                        output,
                        "{} Suite has {} error(s):",
                        "✗".red(),
                        result.error_count()
                    );
                    for error in &result.errors {
                        let _ = writeln!(output, "  - {error}");
                    }
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "  - {warning}");
                    }
                }

                output.push_str("\nSuite summary:\n");
                let _ = writeln!(output, "  Name: {}", config.suite.name);
                let _ = writeln!(output, "  Scenarios: {}", config.scenarios.len());
                let _ = writeln!(output, "  Runs: {}", config.run_count());
                let _ = writeln!(output, "  Parallelism: {}", config.defaults.parallelism);
                output
            }
        }
    }

    /// Formats the result of checking a rendered plan.
    #[must_use]
    pub fn format_check(&self, report: &ExpectationReport, summary: &ChangeSummary) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "passed": report.passed(),
                    "matched": report.matched,
                    "missing": report.missing,
                    "change_count": report.change_count,
                    "min_changes": report.min_changes,
                    "summary": summary,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                for resource_type in &report.matched {
                    let _ = writeln!(output, "  {} {resource_type}", "✓".green());
                }
                for resource_type in &report.missing {
                    let _ = writeln!(output, "  {} {resource_type}", "✗".red());
                }
                if let Some(minimum) = report.min_changes {
                    let mark = if report.change_count >= minimum {
                        "✓".green()
                    } else {
                        "✗".red()
                    };
                    let _ = writeln!(
                        output,
                        "  {mark} at least {minimum} change(s), found {}",
                        report.change_count
                    );
                }
                let _ = write!(output, "\nPlan: {summary}\n");
                output
            }
        }
    }

    /// Formats a run status with color.
    fn format_status(status: RunStatus) -> String {
        match status {
            RunStatus::Passed => "passed".green().to_string(),
            RunStatus::Failed => "failed".red().to_string(),
            RunStatus::Skipped => "skipped".dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn seconds(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct RunJson {
    name: String,
    dir: String,
    plan_file: String,
    parallel: bool,
    expected_types: Vec<String>,
    min_changes: Option<usize>,
    fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;
    use crate::runner::ScenarioResult;
    use crate::error::FailureKind;
    use chrono::Utc;

    fn report() -> SuiteReport {
        SuiteReport {
            suite: String::from("iac-lab"),
            run_id: String::from("run-1"),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            results: vec![
                ScenarioResult {
                    name: String::from("network"),
                    fingerprint: String::from("abc"),
                    status: RunStatus::Passed,
                    failure_kind: None,
                    message: None,
                    matched_types: vec![String::from("azurerm_subnet")],
                    missing_types: Vec::new(),
                    summary: Some(ChangeSummary {
                        create: 4,
                        ..ChangeSummary::default()
                    }),
                    workspace: None,
                    duration_ms: 1500,
                },
                ScenarioResult {
                    name: String::from("security"),
                    fingerprint: String::from("def"),
                    status: RunStatus::Failed,
                    failure_kind: Some(FailureKind::Assertion),
                    message: Some(String::from("missing azurerm_network_security_rule")),
                    matched_types: Vec::new(),
                    missing_types: vec![String::from("azurerm_network_security_rule")],
                    summary: None,
                    workspace: None,
                    duration_ms: 900,
                },
            ],
        }
    }

    #[test]
    fn test_report_text() {
        colored::control::set_override(false);
        let output = OutputFormatter::new(OutputFormat::Text).format_report(&report());

        assert!(output.contains("network"));
        assert!(output.contains("azurerm_network_security_rule"));
        assert!(output.contains("[assertion]"));
        assert!(output.contains("1 passed, 1 failed, 0 skipped"));
    }

    #[test]
    fn test_report_json() {
        let output = OutputFormatter::new(OutputFormat::Json).format_report(&report());
        let json: serde_json::Value = serde_json::from_str(&output).expect("valid json");

        assert_eq!(json["results"][1]["status"], "failed");
        assert_eq!(json["results"][0]["summary"]["create"], 4);
    }

    #[test]
    fn test_runs_json() {
        let config = ConfigParser::new()
            .parse_yaml(
                r"
suite:
  name: iac-lab
scenarios:
  - name: root
    dir: .
    parallel: false
    expect:
      resource_types: [azurerm_resource_group]
    cases:
      - name: default
      - name: custom-location
        vars:
          location: northeurope
",
                None,
            )
            .expect("suite should parse");

        let output = OutputFormatter::new(OutputFormat::Json).format_runs(&config.expand_runs());
        let json: serde_json::Value = serde_json::from_str(&output).expect("valid json");

        assert_eq!(json.as_array().map(Vec::len), Some(2));
        assert_eq!(json[0]["name"], "root/default");
        assert_eq!(json[1]["parallel"], false);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("azurerm_virtual_network", 10), "azurerm...");
    }
}
