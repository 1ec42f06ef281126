use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use ci_guard_core::{
    display_repo, run_check, CheckKind, GuardConfig, GuardError, PolicyReport,
    ValidationOptions,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Enforce CI policies on workflows and Helm chart values")]
struct Cli {
    /// Repository checkout to inspect.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// TOML config file. Defaults to ci-guard.toml under the root when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Also write the reports as JSON to this file.
    #[arg(long, global = true)]
    report: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check `uses:` references in workflow files against the action allow-list.
    Actions,
    /// Check Datadog environment variables in chart values files.
    DdFlags(RepoArgs),
    /// Flag YAML files that declare a `resources` section.
    Resources,
    /// Run every check enabled in the config.
    All(RepoArgs),
    /// Summarise a saved JSON report.
    Report(ReportArgs),
}

#[derive(Args)]
struct RepoArgs {
    /// Repository identifier in `owner/repo` form.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,
    /// CSV allow-list of optional flags per repository.
    #[arg(long)]
    allowlist: Option<PathBuf>,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long)]
    input: PathBuf,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let (selected, repo_args) = match cli.command {
        Commands::Report(args) => {
            init_tracing(None);
            return handle_report(&args);
        }
        Commands::Actions => (Some(CheckKind::AllowedActions), None),
        Commands::Resources => (Some(CheckKind::ForbiddenResources), None),
        Commands::DdFlags(args) => (Some(CheckKind::DdFlags), Some(args)),
        Commands::All(args) => (None, Some(args)),
    };

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("cannot resolve current directory")?,
    };
    let config = GuardConfig::discover(&root, cli.config.as_deref())?;
    init_tracing(config.trace_filter());
    debug!(root = %root.display(), "loaded configuration");

    let run_id = format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S"));
    let mut options = ValidationOptions::new(root, run_id);
    if let Some(args) = repo_args {
        options = options
            .with_repository(args.repository)
            .with_allowlist(args.allowlist);
    }

    let kinds = match selected {
        Some(kind) => vec![kind],
        None => config.checks.enabled_checks(),
    };

    // Reports finished before an unregistered repository stops the run are
    // still printed.
    let mut reports = Vec::with_capacity(kinds.len());
    for kind in kinds {
        match run_check(kind, &config, &options) {
            Ok(report) => {
                print!("{}", report.render_text());
                reports.push(report);
            }
            Err(GuardError::UnregisteredRepository { repo }) => {
                warn!(repo = %display_repo(&repo), "repository missing from allow-list");
                print_unregistered(&repo);
                return Ok(ExitCode::FAILURE);
            }
            Err(err) => return Err(err.into()),
        }
    }

    let report_path = cli
        .report
        .or_else(|| {
            config
                .report
                .as_ref()
                .map(|r| options.workspace_root.join(&r.path))
        });
    if let Some(path) = report_path {
        write_reports(&path, &reports)?;
        info!(path = %path.display(), reports = reports.len(), "wrote JSON report");
        println!("Report written to {}", path.display());
    }

    if reports.iter().all(PolicyReport::passed) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Logs go to stderr so stdout stays the violation listing. `RUST_LOG` wins
/// over the config filter.
fn init_tracing(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn print_unregistered(repo: &str) {
    println!("❌ Repository is not registered for Datadog flags compliance checks.");
    println!("  - Detected repo: '{}'", display_repo(repo));
    println!(
        "  - Action: contact the DevOps team to get this repository registered in the central allowlist (dd_flags_allowlist.csv)."
    );
    println!("  - Once registered, re-run the workflow.");
}

fn write_reports(path: &Path, reports: &[PolicyReport]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, serde_json::to_string_pretty(reports)?)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

fn handle_report(args: &ReportArgs) -> Result<ExitCode> {
    let data = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let reports: Vec<PolicyReport> = serde_json::from_str(&data)
        .with_context(|| format!("{} is not a ci-guard report", args.input.display()))?;
    for report in &reports {
        println!(
            "Report {} [{}] -> {:?} ({} violations, {} skipped files)",
            report.id,
            report.check,
            report.summary.status,
            report.violations.len(),
            report.skipped.len()
        );
    }
    Ok(ExitCode::SUCCESS)
}
