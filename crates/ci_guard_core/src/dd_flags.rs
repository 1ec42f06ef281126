//! Datadog flags guard for Helm chart values files.
//!
//! Every chart must declare the four required `DD_*` variables under an `env`
//! list. The production values file takes precedence and the base
//! `values.yaml` fills whatever production leaves out, so production overrides
//! may stay partial. Any other `DD_*` variable must be approved for the
//! repository in the allow-list.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::allowlist::RepoAllowlist;
use crate::error::{GuardError, Result};
use crate::report::{Violation, ViolationKind};
use crate::tree;

/// Sorted so missing variables are always listed in the same order.
pub const REQUIRED_DD_VARS: [&str; 4] = ["DD_AGENT_HOST", "DD_ENV", "DD_SERVICE", "DD_VERSION"];

pub const BASE_VALUES_FILE: &str = "values.yaml";
pub const PRODUCTION_VALUES_FILE: &str = "values-production-us-central1.yaml";

pub const NO_CHARTS_NOTICE: &str =
    "No values files found to validate under ./charts/*/. Skipping Datadog flags guard.";

/// One `env` entry whose name starts with `DD_`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvEntry {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chart {
    pub dir: PathBuf,
    pub base: Option<PathBuf>,
    pub production: Option<PathBuf>,
}

impl Chart {
    /// Values files in the order they are checked.
    pub fn files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = self
            .base
            .iter()
            .chain(self.production.iter())
            .map(PathBuf::as_path)
            .collect();
        files.sort();
        files
    }
}

#[derive(Debug)]
pub struct GuardInput<'a> {
    pub root: &'a Path,
    pub charts_dir: &'a Path,
    pub production_values: &'a str,
    pub repo: &'a str,
    pub allowlist: &'a RepoAllowlist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    NoCharts,
    Checked {
        charts: usize,
        violations: Vec<Violation>,
    },
}

/// Keyed by name; a later entry with the same name replaces an earlier one.
pub fn collect_dd_flags(doc: &serde_yaml::Value) -> BTreeMap<String, EnvEntry> {
    let mut flags = BTreeMap::new();
    for entry in tree::env_entries(doc) {
        let name = entry
            .get("name")
            .map(tree::scalar_text)
            .unwrap_or_default()
            .trim()
            .to_owned();
        if !name.starts_with("DD_") {
            continue;
        }
        let value = entry.get("value").map(tree::scalar_text);
        flags.insert(name.clone(), EnvEntry { name, value });
    }
    flags
}

/// Non-hidden immediate subdirectories of `charts_dir` holding a base or production
/// values file, sorted by directory.
pub fn discover_charts(charts_dir: &Path, production_values: &str) -> Result<Vec<Chart>> {
    if !charts_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut charts = Vec::new();
    for entry in walkdir::WalkDir::new(charts_dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_name().to_str().map_or(true, |name| name.starts_with('.')) {
            continue;
        }
        let dir = entry.into_path();
        if !dir.is_dir() {
            continue;
        }
        let base = Some(dir.join(BASE_VALUES_FILE)).filter(|p| p.is_file());
        let production = Some(dir.join(production_values)).filter(|p| p.is_file());
        if base.is_some() || production.is_some() {
            charts.push(Chart {
                dir,
                base,
                production,
            });
        }
    }
    charts.sort_by(|a, b| a.dir.cmp(&b.dir));
    Ok(charts)
}

/// Runs the guard. Fails with [`GuardError::UnregisteredRepository`] before
/// looking at any chart when the repository has no allow-list row.
pub fn run_guard(input: &GuardInput<'_>) -> Result<GuardOutcome> {
    let Some(approved) = input.allowlist.approved_flags(input.repo) else {
        return Err(GuardError::UnregisteredRepository {
            repo: input.repo.to_owned(),
        });
    };

    let charts = discover_charts(input.charts_dir, input.production_values)?;
    if charts.is_empty() {
        info!(dir = %input.charts_dir.display(), "no chart values files found");
        return Ok(GuardOutcome::NoCharts);
    }

    let parsed: Vec<ParsedChart> = charts
        .iter()
        .map(|chart| ParsedChart::load(input.root, chart))
        .collect();

    let mut violations = Vec::new();
    for chart in &parsed {
        for file in &chart.files {
            match &file.flags {
                Ok(flags) => {
                    for name in flags.keys() {
                        if REQUIRED_DD_VARS.contains(&name.as_str()) || approved.contains(name) {
                            continue;
                        }
                        violations.push(Violation::new(
                            &file.shown,
                            ViolationKind::UnapprovedFlag,
                            format!(
                                "{name} is not permitted for repo '{}'. Remove it or request approval.",
                                input.repo
                            ),
                        ));
                    }
                }
                Err(reason) => violations.push(Violation::new(
                    &file.shown,
                    ViolationKind::ParseError,
                    format!("Unable to parse YAML: {reason}"),
                )),
            }
        }
    }

    for chart in &parsed {
        if let Some(violation) = chart.missing_required() {
            violations.push(violation);
        }
    }

    info!(
        repo = input.repo,
        charts = parsed.len(),
        violations = violations.len(),
        "Datadog flags guard finished"
    );
    Ok(GuardOutcome::Checked {
        charts: parsed.len(),
        violations,
    })
}

struct ParsedFile {
    shown: PathBuf,
    role: Role,
    flags: std::result::Result<BTreeMap<String, EnvEntry>, String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Base,
    Production,
}

struct ParsedChart {
    files: Vec<ParsedFile>,
}

impl ParsedChart {
    /// Read and parse failures are kept per file so the rest of the run
    /// still happens.
    fn load(root: &Path, chart: &Chart) -> Self {
        let mut files = Vec::new();
        for path in chart.files() {
            let role = if chart.base.as_deref() == Some(path) {
                Role::Base
            } else {
                Role::Production
            };
            let shown = crate::display_path(root, path);
            let parsed = fs::read_to_string(path)
                .map_err(|err| err.to_string())
                .and_then(|text| {
                    serde_yaml::from_str::<serde_yaml::Value>(&text).map_err(|err| err.to_string())
                });
            let flags = match parsed {
                Ok(doc) => {
                    let flags = collect_dd_flags(&doc);
                    debug!(file = %shown.display(), flags = flags.len(), "collected Datadog flags");
                    Ok(flags)
                }
                Err(reason) => {
                    warn!(file = %shown.display(), error = %reason, "values file could not be parsed");
                    Err(reason)
                }
            };
            files.push(ParsedFile { shown, role, flags });
        }
        Self { files }
    }

    fn file(&self, role: Role) -> Option<&ParsedFile> {
        self.files.iter().find(|f| f.role == role)
    }

    fn declares(&self, role: Role, var: &str) -> bool {
        self.file(role)
            .and_then(|f| f.flags.as_ref().ok())
            .is_some_and(|flags| flags.contains_key(var))
    }

    /// Production first, base as fallback. Attributed to the base file when
    /// the chart has one.
    fn missing_required(&self) -> Option<Violation> {
        let missing: Vec<&str> = REQUIRED_DD_VARS
            .iter()
            .copied()
            .filter(|var| !self.declares(Role::Production, var) && !self.declares(Role::Base, var))
            .collect();
        if missing.is_empty() {
            return None;
        }
        let target = self.file(Role::Base).or_else(|| self.file(Role::Production))?;
        Some(Violation::new(
            &target.shown,
            ViolationKind::MissingRequired,
            format!(
                "Missing required Datadog vars under 'env': {}",
                missing.join(", ")
            ),
        ))
    }
}
