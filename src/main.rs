//! plancheck CLI entrypoint.
//!
//! This is the main entrypoint for the plancheck command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use plancheck::cli::{Cli, Commands, OutputFormatter};
use plancheck::config::{ConfigParser, ConfigValidator, SuiteConfig, find_config_file};
use plancheck::error::{ConfigError, Result};
use plancheck::harness::PlanHarness;
use plancheck::planner::{Expectations, PlanResult};
use plancheck::runner::{RunnerOptions, SuiteRunner, select_runs};
use plancheck::terraform::TerraformCli;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::List => cmd_list(cli.config.as_ref(), &formatter),
        Commands::Run {
            scenarios,
            parallelism,
            fail_fast,
            keep_workspaces,
            report,
        } => {
            let overrides = RunOverrides {
                scenarios,
                parallelism,
                fail_fast,
                keep_workspaces,
                report,
            };
            cmd_run(cli.config.as_ref(), overrides, &formatter).await
        }
        Commands::Check {
            plan_json,
            expect,
            min_changes,
        } => cmd_check(&plan_json, expect, min_changes, &formatter).await,
    }
}

/// Command-line overrides for a suite run.
struct RunOverrides {
    scenarios: Vec<String>,
    parallelism: Option<usize>,
    fail_fast: bool,
    keep_workspaces: bool,
    report: Option<PathBuf>,
}

/// Initialize a new suite.
fn cmd_init(path: &Path, force: bool) -> Result<ExitCode> {
    info!("Initializing new plancheck suite in: {}", path.display());

    let config_path = path.join("plancheck.yaml");
    let env_path = path.join(".env.example");
    let gitignore_path = path.join(".gitignore");

    // Check if files exist
    if !force && config_path.exists() {
        eprintln!("Suite file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(ExitCode::SUCCESS);
    }

    // Create directory if needed
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    // Write suite template
    let config_template = include_str!("../templates/plancheck.yaml");
    std::fs::write(&config_path, config_template)?;
    eprintln!("Created: {}", config_path.display());

    // Write .env.example
    let env_template = include_str!("../templates/.env.example");
    std::fs::write(&env_path, env_template)?;
    eprintln!("Created: {}", env_path.display());

    // Write/update .gitignore
    let ignored = [".env", "*.tfplan", "*.tfvars.json"];
    if gitignore_path.exists() {
        let existing = std::fs::read_to_string(&gitignore_path)?;
        let missing: Vec<_> = ignored
            .iter()
            .filter(|entry| !existing.lines().any(|line| line.trim() == **entry))
            .collect();
        if !missing.is_empty() {
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(&gitignore_path)?;
            writeln!(file, "\n# plancheck")?;
            for entry in missing {
                writeln!(file, "{entry}")?;
            }
            eprintln!("Updated: {}", gitignore_path.display());
        }
    } else {
        std::fs::write(&gitignore_path, format!("{}\n", ignored.join("\n")))?;
        eprintln!("Created: {}", gitignore_path.display());
    }

    eprintln!("\nSuite initialized successfully!");
    eprintln!("Next steps:");
    eprintln!("  1. Copy .env.example to .env and fill in your provider credentials");
    eprintln!("  2. Edit plancheck.yaml with your scenarios and expected resource types");
    eprintln!("  3. Run 'plancheck validate' to check your suite");
    eprintln!("  4. Run 'plancheck run' to plan and check every scenario");

    Ok(ExitCode::SUCCESS)
}

/// Validate the suite file.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating suite: {}", config_file.display());

    let (config, root) = load_suite(&config_file)?;
    let result = ConfigValidator::new().with_root(&root).collect(&config);

    emit(formatter, &formatter.format_validation(&config, &result, show_warnings))?;

    if result.is_valid() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// List the runs a suite expands to.
fn cmd_list(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<ExitCode> {
    let config_file = resolve_config_path(config_path)?;
    let (config, root) = load_suite(&config_file)?;
    ConfigValidator::new().with_root(&root).validate(&config)?;

    emit(formatter, &formatter.format_runs(&config.expand_runs()))?;
    Ok(ExitCode::SUCCESS)
}

/// Plan every selected scenario and check its expectations.
async fn cmd_run(
    config_path: Option<&PathBuf>,
    overrides: RunOverrides,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let config_file = resolve_config_path(config_path)?;
    let (config, root) = load_suite(&config_file)?;

    let result = ConfigValidator::new().with_root(&root).validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    let runs = select_runs(config.expand_runs(), &overrides.scenarios)?;

    let environment = ConfigParser::resolve_provider_env(&config)?;
    let backend = TerraformCli::from_config(&config.terraform);
    debug!("Using planning tool '{}'", backend.binary());

    let harness = PlanHarness::new(backend, environment)
        .with_empty_policy(config.defaults.empty_expectations);

    let mut options = RunnerOptions::from_defaults(&config.defaults, ConfigParser::scratch_dir());
    if let Some(parallelism) = overrides.parallelism {
        if parallelism == 0 {
            return Err(ConfigError::validation(
                "--parallelism must be at least 1",
                "defaults.parallelism",
            )
            .into());
        }
        options.parallelism = parallelism;
    }
    options.fail_fast = overrides.fail_fast;
    options.keep_workspaces |= overrides.keep_workspaces;

    let runner = SuiteRunner::new(harness, &root, options);
    let report = runner.run(&config.suite.name, runs).await;

    if let Some(path) = &overrides.report {
        report.write_json(path).await?;
    }

    emit(formatter, &formatter.format_report(&report))?;

    if report.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Check an already rendered plan.
async fn cmd_check(
    plan_json: &Path,
    expected: Vec<String>,
    min_changes: Option<usize>,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    debug!("Reading plan from: {}", plan_json.display());
    let bytes = tokio::fs::read(plan_json).await?;
    let plan = PlanResult::from_json(&bytes)?;

    let mut expectations = Expectations::types(expected);
    if let Some(minimum) = min_changes {
        expectations = expectations.with_min_changes(minimum);
    }
    if expectations.is_empty() {
        warn!("No expectations given; check passes trivially");
    }

    let report = expectations.evaluate(&plan);
    emit(formatter, &formatter.format_check(&report, &plan.summary()))?;

    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the suite file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads `.env`, the suite file and its environment overrides.
fn load_suite(config_file: &Path) -> Result<(SuiteConfig, PathBuf)> {
    debug!("Loading suite from: {}", config_file.display());

    let suite_dir = config_file.parent().unwrap_or_else(|| Path::new("."));
    let parser = ConfigParser::new().with_base_path(suite_dir);
    parser.load_dotenv()?;

    let config = parser.load_with_env(config_file)?;
    let root = config.resolve_root(suite_dir);

    Ok((config, root))
}

/// Writes formatted output: JSON to stdout, text to stderr.
fn emit(formatter: &OutputFormatter, output: &str) -> Result<()> {
    if formatter.is_json() {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{output}")?;
    } else {
        eprintln!("{output}");
    }
    Ok(())
}
