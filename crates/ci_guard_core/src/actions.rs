//! Allowed-actions check for GitHub Actions workflow files.
//!
//! Every `uses:` value in a workflow must contain one of [`ALLOWED_ACTIONS`].
//! Matching is substring containment, so `actions/checkout@v2-evil` passes
//! because it contains `actions/checkout@v2`. This is the org policy as written
//! and is kept loose on purpose; tighten the list, not the matcher.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::report::{SkippedFile, Violation, ViolationKind};
use crate::tree;

pub const ALLOWED_ACTIONS: &[&str] = &[
    "actions/checkout@v2",
    "actions/checkout@v3",
    "actions/checkout@v4",
    "actions/setup-java@v3",
    "actions/setup-node@v3",
    "actions/setup-node@v4",
    "actions/setup-python@v2",
    "actions/setup-python@v3",
    "actions/setup-python@v4",
    "actions/upload-artifact@v3",
    "actions/upload-artifact@v4",
    "actions/download-artifact@v3",
    "actions/download-artifact@v4",
    "docker/login-action@v3",
    "aws-actions/configure-aws-credentials@v2",
    "aws-actions/amazon-ecr-login@v1",
    "google-github-actions/auth@v0",
    "google-github-actions/auth@v1",
    "google-github-actions/auth@v2",
    "google-github-actions/setup-gcloud@v1",
    "google-github-actions/setup-gcloud@v2",
    "ZAGENO/infra-shared-workflows/build-and-push-image@main",
    "ZAGENO/infra-shared-workflows/build-and-push-image-aws@main",
    "ZAGENO/infra-shared-workflows/lint-helm-chart@main",
    "ZAGENO/infra-shared-workflows/lint-helm-chart-v2@main",
    "ZAGENO/pygeno/.github/workflows/build-publish-docker-image.yml@master",
    "TimonVS/pr-labeler-action@v3",
    "suo/flake8-github-action@releases/v1",
    "elgohr/gcloud-login-action@v1",
    "elgohr/gcloud-login-action@master",
    "addnab/docker-run-action@v3",
    "sliteteam/github-action-git-crypt-unlock@1.2.0",
    "dcarbone/install-yq-action@v1.1.1",
    "sonarsource/sonarcloud-github-action@master",
    "snok/install-poetry@v1",
    "5monkeys/cobertura-action@master",
    "cirrus-actions/rebase@1.8",
];

#[derive(Debug, Default)]
pub struct ActionsOutcome {
    pub violations: Vec<Violation>,
    pub skipped: Vec<SkippedFile>,
    pub files_checked: usize,
}

pub fn is_allowed(reference: &str, allowed: &[&str]) -> bool {
    allowed.iter().any(|entry| reference.contains(entry))
}

/// Checks every workflow file directly inside `workflows_dir`. Paths in the
/// outcome are shown relative to `root`.
pub fn check_workflows(root: &Path, workflows_dir: &Path) -> Result<ActionsOutcome> {
    let mut outcome = ActionsOutcome::default();
    for path in discover_workflows(workflows_dir)? {
        let shown = crate::display_path(root, &path);
        let parsed = fs::read_to_string(&path)
            .map_err(|err| err.to_string())
            .and_then(|text| {
                serde_yaml::from_str::<serde_yaml::Value>(&text).map_err(|err| err.to_string())
            });
        match parsed {
            Ok(doc) => {
                debug!(file = %shown.display(), "checking workflow");
                outcome.violations.extend(check_document(&shown, &doc, ALLOWED_ACTIONS));
                outcome.files_checked += 1;
            }
            Err(reason) => {
                warn!(file = %shown.display(), error = %reason, "skipping unparseable workflow");
                outcome.skipped.push(SkippedFile {
                    path: shown,
                    reason,
                });
            }
        }
    }
    info!(
        files = outcome.files_checked,
        violations = outcome.violations.len(),
        "allowed-actions check finished"
    );
    Ok(outcome)
}

pub fn check_document(file: &Path, doc: &serde_yaml::Value, allowed: &[&str]) -> Vec<Violation> {
    tree::values_under_key(doc, "uses")
        .into_iter()
        .map(tree::scalar_text)
        .filter(|reference| !is_allowed(reference, allowed))
        .map(|reference| Violation::new(file, ViolationKind::DisallowedAction, reference))
        .collect()
}

/// Non-hidden files named `*.y*ml` directly inside `dir`, sorted. A missing
/// directory has no workflows.
pub fn discover_workflows(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        if entry.file_name().to_str().is_some_and(is_workflow_name) {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

fn is_workflow_name(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    match name.strip_suffix("ml") {
        Some(stem) => stem.contains(".y"),
        None => false,
    }
}
