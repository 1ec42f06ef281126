//! End-to-end tests for `ci-guard dd-flags`.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const REQUIRED: [&str; 4] = ["DD_AGENT_HOST", "DD_SERVICE", "DD_VERSION", "DD_ENV"];

fn ci_guard(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ci-guard"));
    cmd.current_dir(dir.path())
        .env_remove("GITHUB_REPOSITORY")
        .env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn env_block(names: &[&str]) -> String {
    let mut body = String::from("env:\n");
    for name in names {
        body.push_str(&format!("  - name: {name}\n    value: \"x\"\n"));
    }
    body
}

fn repo_with_allowlist() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "dd_flags_allowlist.csv",
        "repo,flag1,flag2\nrepo-a,DD_TRACE_ENABLED\n",
    );
    dir
}

#[test]
fn approved_flags_pass() {
    let dir = repo_with_allowlist();
    let mut names = REQUIRED.to_vec();
    names.push("DD_TRACE_ENABLED");
    write(dir.path(), "charts/svc/values.yaml", &env_block(&names));

    ci_guard(&dir)
        .args(["dd-flags", "--repository", "acme/repo-a"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Datadog flags policy passed for all checked values files.",
        ));
}

#[test]
fn unapproved_flag_fails_and_is_named() {
    let dir = repo_with_allowlist();
    let mut names = REQUIRED.to_vec();
    names.extend(["DD_TRACE_ENABLED", "DD_LOGS_INJECTION"]);
    write(dir.path(), "charts/svc/values.yaml", &env_block(&names));

    ci_guard(&dir)
        .args(["dd-flags"])
        .env("GITHUB_REPOSITORY", "acme/repo-a")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "charts/svc/values.yaml: DD_LOGS_INJECTION is not permitted for repo 'repo-a'",
        ))
        .stdout(predicate::str::contains("DD_TRACE_ENABLED").not());
}

#[test]
fn production_file_alone_satisfies_required() {
    let dir = repo_with_allowlist();
    write(
        dir.path(),
        "charts/svc/values-production-us-central1.yaml",
        &env_block(&REQUIRED),
    );

    ci_guard(&dir)
        .args(["dd-flags", "--repository", "acme/repo-a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Missing required").not());
}

#[test]
fn unregistered_repo_exits_one_regardless_of_charts() {
    let dir = repo_with_allowlist();
    write(dir.path(), "charts/svc/values.yaml", &env_block(&REQUIRED));

    ci_guard(&dir)
        .args(["dd-flags", "--repository", "acme/repo-z"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Repository is not registered for Datadog flags compliance checks.",
        ))
        .stdout(predicate::str::contains("Detected repo: 'repo-z'"));

    ci_guard(&dir)
        .args(["dd-flags"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Detected repo: '[unknown]'"));
}

#[test]
fn missing_allowlist_file_means_unregistered() {
    let dir = TempDir::new().unwrap();
    ci_guard(&dir)
        .args(["dd-flags", "--repository", "acme/repo-a"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("not registered"));
}

#[test]
fn no_charts_is_skipped_cleanly() {
    let dir = repo_with_allowlist();
    ci_guard(&dir)
        .args(["dd-flags", "--repository", "acme/repo-a"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No values files found to validate under ./charts/*/. Skipping Datadog flags guard.",
        ));
}

#[test]
fn custom_allowlist_path_is_used() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "policy/flags.csv", "repo\nrepo-b,DD_PROFILING_ENABLED\n");
    let mut names = REQUIRED.to_vec();
    names.push("DD_PROFILING_ENABLED");
    write(dir.path(), "charts/svc/values.yaml", &env_block(&names));

    ci_guard(&dir)
        .args([
            "dd-flags",
            "--repository",
            "acme/repo-b",
            "--allowlist",
            "policy/flags.csv",
        ])
        .assert()
        .success();
}

#[test]
fn all_violations_are_listed_and_stable() {
    let dir = repo_with_allowlist();
    write(dir.path(), "charts/a/values.yaml", "env:\n  - name: DD_SERVICE\n");
    write(
        dir.path(),
        "charts/b/values.yaml",
        &env_block(&["DD_AGENT_HOST", "DD_SERVICE", "DD_VERSION", "DD_ENV", "DD_X"]),
    );

    let run = || {
        ci_guard(&dir)
            .args(["dd-flags", "--repository", "acme/repo-a"])
            .assert()
            .code(1)
            .get_output()
            .stdout
            .clone()
    };
    let first = String::from_utf8(run()).unwrap();
    let second = String::from_utf8(run()).unwrap();
    assert_eq!(first, second);

    let listed: Vec<&str> = first
        .lines()
        .filter(|line| line.starts_with("  - "))
        .collect();
    assert_eq!(
        listed,
        vec![
            "  - charts/b/values.yaml: DD_X is not permitted for repo 'repo-a'. Remove it or request approval.",
            "  - charts/a/values.yaml: Missing required Datadog vars under 'env': DD_AGENT_HOST, DD_ENV, DD_VERSION",
        ]
    );
}

#[test]
fn production_overrides_inherit_from_base() {
    let dir = repo_with_allowlist();
    write(
        dir.path(),
        "charts/svc/values.yaml",
        &env_block(&["DD_AGENT_HOST", "DD_SERVICE"]),
    );
    write(
        dir.path(),
        "charts/svc/values-production-us-central1.yaml",
        &env_block(&["DD_VERSION", "DD_ENV"]),
    );

    ci_guard(&dir)
        .args(["dd-flags", "--repository", "acme/repo-a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Missing required").not());
}

#[test]
fn malformed_values_file_is_reported() {
    let dir = repo_with_allowlist();
    write(dir.path(), "charts/svc/values.yaml", "env: [\n");

    ci_guard(&dir)
        .args(["dd-flags", "--repository", "acme/repo-a"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "charts/svc/values.yaml: Unable to parse YAML",
        ));
}

#[test]
fn undecodable_values_file_does_not_stop_other_charts() {
    let dir = repo_with_allowlist();
    let bad = dir.path().join("charts/a/values.yaml");
    fs::create_dir_all(bad.parent().unwrap()).unwrap();
    fs::write(&bad, b"env:\n  - name: \xff\xfe\n").unwrap();
    let mut names = REQUIRED.to_vec();
    names.push("DD_LOGS_INJECTION");
    write(dir.path(), "charts/b/values.yaml", &env_block(&names));

    ci_guard(&dir)
        .args(["dd-flags", "--repository", "acme/repo-a"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "charts/a/values.yaml: Unable to parse YAML",
        ))
        .stdout(predicate::str::contains(
            "charts/b/values.yaml: DD_LOGS_INJECTION is not permitted",
        ));
}

#[test]
fn hidden_chart_dirs_are_not_checked() {
    let dir = repo_with_allowlist();
    write(dir.path(), "charts/.cache/values.yaml", &env_block(&["DD_X"]));
    write(dir.path(), "charts/svc/values.yaml", &env_block(&REQUIRED));

    ci_guard(&dir)
        .args(["dd-flags", "--repository", "acme/repo-a"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".cache").not());
}
