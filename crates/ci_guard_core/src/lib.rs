pub mod actions;
pub mod allowlist;
pub mod analyzers;
pub mod config;
pub mod dd_flags;
pub mod error;
pub mod report;
pub mod resources;
pub mod tree;

use std::path::{Path, PathBuf};

pub use analyzers::{run_check, run_validations, ValidationOptions};
pub use config::{CheckToggles, GuardConfig};
pub use error::{display_repo, GuardError, Result};
pub use report::{
    CheckKind, CheckStatus, PolicyReport, ReportSummary, SkippedFile, Violation, ViolationKind,
};

/// `path` relative to `root` when it lives underneath it.
pub(crate) fn display_path(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}
