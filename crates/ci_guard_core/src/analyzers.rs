use std::path::{Path, PathBuf};

use crate::actions::{self, ALLOWED_ACTIONS};
use crate::allowlist::{repo_name_from_identifier, RepoAllowlist};
use crate::config::GuardConfig;
use crate::dd_flags::{self, GuardInput, GuardOutcome, NO_CHARTS_NOTICE};
use crate::error::Result;
use crate::report::{CheckKind, PolicyReport};
use crate::resources;

pub struct ValidationOptions {
    pub workspace_root: PathBuf,
    pub run_id: String,
    /// `owner/repo` identifier, usually from `GITHUB_REPOSITORY`.
    pub repository: Option<String>,
    /// Overrides `[paths].allowlist`.
    pub allowlist: Option<PathBuf>,
}

impl ValidationOptions {
    pub fn new(workspace_root: PathBuf, run_id: impl Into<String>) -> Self {
        Self {
            workspace_root,
            run_id: run_id.into(),
            repository: None,
            allowlist: None,
        }
    }

    pub fn with_repository(mut self, repository: Option<String>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_allowlist(mut self, allowlist: Option<PathBuf>) -> Self {
        self.allowlist = allowlist;
        self
    }

    pub fn repo_name(&self) -> String {
        self.repository
            .as_deref()
            .map(repo_name_from_identifier)
            .unwrap_or_default()
    }
}

/// Runs every check enabled in `[checks]`, in a fixed order.
pub fn run_validations(
    config: &GuardConfig,
    options: &ValidationOptions,
) -> Result<Vec<PolicyReport>> {
    config
        .checks
        .enabled_checks()
        .into_iter()
        .map(|kind| run_check(kind, config, options))
        .collect()
}

pub fn run_check(
    kind: CheckKind,
    config: &GuardConfig,
    options: &ValidationOptions,
) -> Result<PolicyReport> {
    let root = options.workspace_root.as_path();
    match kind {
        CheckKind::AllowedActions => run_allowed_actions(config, root, &options.run_id),
        CheckKind::DdFlags => run_dd_flags(config, options),
        CheckKind::ForbiddenResources => {
            let violations = resources::check_resources(root)?;
            Ok(PolicyReport::new(
                options.run_id.clone(),
                kind,
                violations,
                Vec::new(),
                "No 'resources' section found in any file.",
            ))
        }
    }
}

fn run_allowed_actions(config: &GuardConfig, root: &Path, run_id: &str) -> Result<PolicyReport> {
    let workflows_dir = config.paths.workflows_dir(root);
    let outcome = actions::check_workflows(root, &workflows_dir)?;
    Ok(PolicyReport::new(
        run_id,
        CheckKind::AllowedActions,
        outcome.violations,
        outcome.skipped,
        format!(
            "All actions used are in the allow-list: {}",
            ALLOWED_ACTIONS.join(", ")
        ),
    ))
}

fn run_dd_flags(config: &GuardConfig, options: &ValidationOptions) -> Result<PolicyReport> {
    let root = options.workspace_root.as_path();
    let allowlist_path = match &options.allowlist {
        Some(path) => root.join(path),
        None => config.paths.allowlist_file(root),
    };
    let allowlist = RepoAllowlist::load(&allowlist_path)?;
    let repo = options.repo_name();
    let charts_dir = config.paths.charts_dir(root);

    let outcome = dd_flags::run_guard(&GuardInput {
        root,
        charts_dir: &charts_dir,
        production_values: config.paths.production_values_name(),
        repo: &repo,
        allowlist: &allowlist,
    })?;

    Ok(match outcome {
        GuardOutcome::NoCharts => {
            PolicyReport::skipped(options.run_id.clone(), CheckKind::DdFlags, NO_CHARTS_NOTICE)
        }
        GuardOutcome::Checked { violations, .. } => PolicyReport::new(
            options.run_id.clone(),
            CheckKind::DdFlags,
            violations,
            Vec::new(),
            "Datadog flags policy passed for all checked values files.",
        ),
    })
}
