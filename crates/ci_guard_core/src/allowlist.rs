//! Per-repository approval list for optional Datadog flags.
//!
//! The file is CSV with a header row followed by `repo,flag1,flag2,...` rows.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::error::{GuardError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoAllowlist {
    repos: BTreeMap<String, BTreeSet<String>>,
}

impl RepoAllowlist {
    /// Loads the allow-list. A missing file is an empty list, which leaves
    /// every repository unregistered.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(data) => Ok(Self::from_csv_str(&data)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "allow-list file not found");
                Ok(Self::default())
            }
            Err(err) => Err(GuardError::io(path, err)),
        }
    }

    pub fn from_csv_str(data: &str) -> Self {
        let mut repos = BTreeMap::new();
        let rows = data
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(split_record)
            .skip(1);
        for row in rows {
            let mut cells = row.into_iter().map(|cell| cell.trim().to_owned());
            let Some(repo) = cells.next() else { continue };
            if repo.is_empty() {
                continue;
            }
            let flags = cells.filter(|cell| !cell.is_empty()).collect();
            repos.insert(repo, flags);
        }
        Self { repos }
    }

    pub fn is_registered(&self, repo: &str) -> bool {
        self.repos.contains_key(repo)
    }

    pub fn approved_flags(&self, repo: &str) -> Option<&BTreeSet<String>> {
        self.repos.get(repo)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }
}

/// Resolves `owner/repo` to `repo`. Identifiers without a slash are returned
/// trimmed but otherwise unchanged.
pub fn repo_name_from_identifier(identifier: &str) -> String {
    let identifier = identifier.trim();
    match identifier.split_once('/') {
        Some((_, repo)) => repo.to_owned(),
        None => identifier.to_owned(),
    }
}

/// Splits one CSV line, honouring double-quoted cells and `""` escapes.
fn split_record(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => cells.push(std::mem::take(&mut cell)),
            _ => cell.push(c),
        }
    }
    cells.push(cell);
    cells
}
