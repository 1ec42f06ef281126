use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{GuardError, Result};
use crate::report::CheckKind;

pub const DEFAULT_CONFIG_FILE: &str = "ci-guard.toml";

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    #[serde(default)]
    pub checks: CheckToggles,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub report: Option<ReportConfig>,
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}

impl GuardConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|err| GuardError::io(path, err))?;
        Self::from_toml_str(&data).map_err(|details| GuardError::ConfigParse {
            path: path.to_path_buf(),
            details,
        })
    }

    pub fn from_toml_str(data: &str) -> std::result::Result<Self, String> {
        toml::from_str(data).map_err(|err| err.to_string())
    }

    /// Uses `explicit` when given, else `ci-guard.toml` under `root` if it
    /// exists, else defaults.
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        let candidate = root.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            Self::from_path(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn trace_filter(&self) -> Option<&str> {
        self.telemetry
            .as_ref()
            .and_then(|t| t.trace_filter.as_deref())
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct CheckToggles {
    #[serde(default)]
    pub allowed_actions: Option<bool>,
    #[serde(default)]
    pub dd_flags: Option<bool>,
    #[serde(default)]
    pub forbidden_resources: Option<bool>,
}

impl CheckToggles {
    pub fn allowed_actions_enabled(&self) -> bool {
        self.allowed_actions.unwrap_or(true)
    }
    pub fn dd_flags_enabled(&self) -> bool {
        self.dd_flags.unwrap_or(true)
    }
    pub fn forbidden_resources_enabled(&self) -> bool {
        self.forbidden_resources.unwrap_or(false)
    }

    /// Enabled checks in the order they run.
    pub fn enabled_checks(&self) -> Vec<CheckKind> {
        [
            (CheckKind::AllowedActions, self.allowed_actions_enabled()),
            (CheckKind::DdFlags, self.dd_flags_enabled()),
            (CheckKind::ForbiddenResources, self.forbidden_resources_enabled()),
        ]
        .into_iter()
        .filter_map(|(kind, enabled)| enabled.then_some(kind))
        .collect()
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct PathConfig {
    #[serde(default)]
    pub workflows: Option<PathBuf>,
    #[serde(default)]
    pub charts: Option<PathBuf>,
    #[serde(default)]
    pub allowlist: Option<PathBuf>,
    #[serde(default)]
    pub production_values: Option<String>,
}

impl PathConfig {
    pub fn workflows_dir(&self, root: &Path) -> PathBuf {
        resolve(root, self.workflows.as_deref(), ".github/workflows")
    }
    pub fn charts_dir(&self, root: &Path) -> PathBuf {
        resolve(root, self.charts.as_deref(), "charts")
    }
    pub fn allowlist_file(&self, root: &Path) -> PathBuf {
        resolve(root, self.allowlist.as_deref(), "dd_flags_allowlist.csv")
    }
    pub fn production_values_name(&self) -> &str {
        self.production_values
            .as_deref()
            .unwrap_or(crate::dd_flags::PRODUCTION_VALUES_FILE)
    }
}

fn resolve(root: &Path, configured: Option<&Path>, default: &str) -> PathBuf {
    root.join(configured.unwrap_or_else(|| Path::new(default)))
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub trace_filter: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = GuardConfig::from_toml_str("").unwrap();
        assert!(cfg.checks.allowed_actions_enabled());
        assert!(cfg.checks.dd_flags_enabled());
        assert!(!cfg.checks.forbidden_resources_enabled());
        assert_eq!(
            cfg.checks.enabled_checks(),
            vec![CheckKind::AllowedActions, CheckKind::DdFlags]
        );
        let root = Path::new("/repo");
        assert_eq!(cfg.paths.charts_dir(root), PathBuf::from("/repo/charts"));
        assert_eq!(
            cfg.paths.workflows_dir(root),
            PathBuf::from("/repo/.github/workflows")
        );
        assert_eq!(
            cfg.paths.production_values_name(),
            "values-production-us-central1.yaml"
        );
        assert!(cfg.report.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = GuardConfig::from_toml_str(
            r#"
[checks]
dd_flags = false
forbidden_resources = true

[paths]
charts = "deploy/charts"
allowlist = "/etc/ci-guard/flags.csv"
production_values = "values-prod.yaml"

[report]
path = "reports/ci-guard.json"

[telemetry]
trace_filter = "debug"
"#,
        )
        .unwrap();
        assert!(!cfg.checks.dd_flags_enabled());
        assert!(cfg.checks.forbidden_resources_enabled());
        let root = Path::new("/repo");
        assert_eq!(
            cfg.paths.charts_dir(root),
            PathBuf::from("/repo/deploy/charts")
        );
        assert_eq!(
            cfg.paths.allowlist_file(root),
            PathBuf::from("/etc/ci-guard/flags.csv")
        );
        assert_eq!(cfg.paths.production_values_name(), "values-prod.yaml");
        assert_eq!(cfg.trace_filter(), Some("debug"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(GuardConfig::from_toml_str("[checks]\nbogus = true\n").is_err());
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = GuardConfig::discover(dir.path(), None).unwrap();
        assert!(cfg.report.is_none());

        fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            "[checks]\nallowed_actions = false\n",
        )
        .unwrap();
        let cfg = GuardConfig::discover(dir.path(), None).unwrap();
        assert!(!cfg.checks.allowed_actions_enabled());
    }

    #[test]
    fn broken_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[checks\n").unwrap();
        let err = GuardConfig::from_path(&path).unwrap_err();
        assert!(matches!(err, GuardError::ConfigParse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }
}
