use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyReport {
    pub id: String,
    pub timestamp: String,
    pub check: CheckKind,
    pub summary: ReportSummary,
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub skipped: Vec<SkippedFile>,
}

impl PolicyReport {
    pub fn new(
        id: impl Into<String>,
        check: CheckKind,
        violations: Vec<Violation>,
        skipped: Vec<SkippedFile>,
        notes: impl Into<String>,
    ) -> Self {
        let status = if violations.is_empty() {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        };
        Self {
            id: id.into(),
            timestamp: Utc::now().to_rfc3339(),
            check,
            summary: ReportSummary {
                status,
                notes: notes.into(),
            },
            violations,
            skipped,
        }
    }

    /// A check that found nothing to inspect.
    pub fn skipped(id: impl Into<String>, check: CheckKind, notes: impl Into<String>) -> Self {
        let mut report = Self::new(id, check, Vec::new(), Vec::new(), notes);
        report.summary.status = CheckStatus::Skipped;
        report
    }

    pub fn passed(&self) -> bool {
        self.summary.status != CheckStatus::Fail
    }

    /// Human-readable listing printed to stdout.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for skipped in &self.skipped {
            out.push_str(&format!(
                "Could not parse {}: {}\n",
                skipped.path.display(),
                skipped.reason
            ));
        }
        match self.summary.status {
            CheckStatus::Skipped => {
                out.push_str(&self.summary.notes);
                out.push('\n');
            }
            CheckStatus::Pass => {
                out.push_str(&format!("✅ {}\n", self.summary.notes));
            }
            CheckStatus::Fail => {
                out.push_str(&format!("❌ {}:\n", self.check.failure_header()));
                for violation in &self.violations {
                    out.push_str(&format!("  - {violation}\n"));
                }
                out.push('\n');
                out.push_str(self.check.remediation());
                out.push('\n');
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    AllowedActions,
    DdFlags,
    ForbiddenResources,
}

impl CheckKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::AllowedActions => "allowed_actions",
            Self::DdFlags => "dd_flags",
            Self::ForbiddenResources => "forbidden_resources",
        }
    }

    fn failure_header(self) -> &'static str {
        match self {
            Self::AllowedActions => "The following policy violations were found",
            Self::DdFlags => "Datadog flags policy violations detected",
            Self::ForbiddenResources => "Forbidden 'resources' sections were found",
        }
    }

    fn remediation(self) -> &'static str {
        match self {
            Self::AllowedActions | Self::ForbiddenResources => {
                "This is not allowed as per org policy. Contact the CloudOps team if you believe this is required."
            }
            Self::DdFlags => {
                "If you believe a flag must be enabled, contact the DevOps team to request approval via the central allowlist."
            }
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub status: CheckStatus,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    pub file: PathBuf,
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(file: &Path, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            file: file.to_path_buf(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    DisallowedAction,
    ParseError,
    MissingRequired,
    UnapprovedFlag,
    ForbiddenResources,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}
