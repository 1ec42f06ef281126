//! Flags YAML files that declare a `resources` section anywhere.
//!
//! Off unless enabled in `[checks]` or run through its own subcommand.
//! Files that fail to parse are not this check's concern and are ignored.

use std::fs;
use std::path::{Component, Path};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::Result;
use crate::report::{Violation, ViolationKind};
use crate::tree;

const IGNORED_DIRS: [&str; 3] = ["target", ".git", "node_modules"];

pub fn check_resources(root: &Path) -> Result<Vec<Violation>> {
    let mut violations = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| filter_entry(e.path().strip_prefix(root).unwrap_or(e.path())));
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_yaml(path) {
            continue;
        }
        let Ok(text) = fs::read_to_string(path) else {
            continue;
        };
        let Ok(doc) = serde_yaml::from_str::<serde_yaml::Value>(&text) else {
            debug!(file = %path.display(), "ignoring unparseable file");
            continue;
        };
        if tree::contains_key(&doc, "resources") {
            let shown = crate::display_path(root, path);
            violations.push(Violation::new(
                &shown,
                ViolationKind::ForbiddenResources,
                "'resources' key found",
            ));
        }
    }
    info!(violations = violations.len(), "forbidden resources check finished");
    Ok(violations)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

fn filter_entry(path: &Path) -> bool {
    !path.components().any(|part| match part {
        Component::Normal(os_str) => os_str
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name)),
        _ => false,
    })
}
