use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuardError>;

/// Failures that stop a check outright. Per-file YAML problems are not errors;
/// they are recorded in the report.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration parse failure in {path}: {details}")]
    ConfigParse { path: PathBuf, details: String },

    #[error("repository '{}' is not registered for Datadog flags compliance checks", display_repo(.repo))]
    UnregisteredRepository { repo: String },

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

impl GuardError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Repository name as shown to users; an empty name becomes `[unknown]`.
pub fn display_repo(repo: &str) -> &str {
    if repo.is_empty() {
        "[unknown]"
    } else {
        repo
    }
}
