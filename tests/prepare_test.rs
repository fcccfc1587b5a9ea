//! Integration tests for `iocbuild prepare`
//!
//! - a cold cache runs the preparation tool, a warm one does not
//! - the tool's exit code is forwarded unchanged
//! - dependencies the tool never provides fail the prepare

#![cfg(unix)]

mod common;

use common::{stderr, stdout, TestProject, BASE_TAG, TARGET};
use predicates::prelude::*;

#[test]
fn test_cold_cache_runs_preparation_tool() {
    let project = TestProject::new();

    let output = project.iocbuild(&["prepare", TARGET]);

    assert!(output.status.success(), "prepare failed: {}", stderr(&output));
    assert_eq!(project.prepare_runs(), 1);
    assert!(project.module_dir("asyn-R4.39").is_dir());
    assert!(project.module_dir(&format!("epics-base-{BASE_TAG}")).is_dir());
    assert!(predicate::str::contains("Prepared ioc-a").eval(&stdout(&output)));
}

#[test]
fn test_prepare_writes_settings_for_the_tool() {
    let project = TestProject::new();

    let output = project.iocbuild(&["prepare", TARGET]);
    assert!(output.status.success(), "prepare failed: {}", stderr(&output));

    let set_file = project.read_file("cache/sets/ioc-a.set");
    assert!(set_file.contains(&format!("BASE={BASE_TAG}")));
    assert!(set_file.contains("ASYN=R4.39"));
    assert!(set_file.contains("MODULES=ASYN"));

    let release_local = project.read_file("cache/modules/RELEASE.local");
    assert!(release_local.contains("ASYN="));
    assert!(project.file_exists("cache/RELEASE_SITE"));
}

#[test]
fn test_json_prepare_keeps_tool_chatter_off_stdout() {
    let project = TestProject::new();
    let fetch = project.fetch_script(&[&format!("epics-base-{BASE_TAG}"), "asyn-R4.39"]);
    project.prepare_script(&format!("echo 'Cloning into asyn...'\n{fetch}"));

    let output = project.iocbuild(&["--json", "prepare", TARGET]);

    assert!(output.status.success(), "prepare failed: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["status"], "success");
    assert!(stderr(&output).contains("Cloning into asyn"));
}

#[test]
fn test_warm_cache_skips_preparation_tool() {
    let project = TestProject::new();

    assert!(project.iocbuild(&["prepare", TARGET]).status.success());
    let output = project.iocbuild(&["prepare", TARGET]);

    assert!(output.status.success(), "prepare failed: {}", stderr(&output));
    assert_eq!(project.prepare_runs(), 1);
    assert!(predicate::str::contains("already up to date").eval(&stdout(&output)));
}

#[test]
fn test_force_reruns_preparation_tool() {
    let project = TestProject::new();

    assert!(project.iocbuild(&["prepare", TARGET]).status.success());
    let output = project.iocbuild(&["prepare", TARGET, "--force"]);

    assert!(output.status.success(), "prepare failed: {}", stderr(&output));
    assert_eq!(project.prepare_runs(), 2);
}

#[test]
fn test_cleaned_cache_fetches_again() {
    let project = TestProject::new();

    assert!(project.iocbuild(&["prepare", TARGET]).status.success());
    assert!(project.iocbuild(&["cache", "clean"]).status.success());
    assert!(project.iocbuild(&["prepare", TARGET]).status.success());

    assert_eq!(project.prepare_runs(), 2);
}

#[test]
fn test_prepare_failure_forwards_exit_code() {
    let project = TestProject::new();
    project.prepare_script("echo 'fatal: repository not found' >&2\nexit 128\n");

    let output = project.iocbuild(&["prepare", TARGET]);

    assert_eq!(output.status.code(), Some(128));
    let err = stderr(&output);
    assert!(err.contains("fatal: repository not found"), "stderr: {err}");
    assert!(err.contains("exit code 128"), "stderr: {err}");
}

#[test]
fn test_unreachable_dependency_fails() {
    let project = TestProject::new();
    project.prepare_script(&project.fetch_script(&[&format!("epics-base-{BASE_TAG}")]));

    let output = project.iocbuild(&["prepare", TARGET]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("ASYN"), "stderr: {}", stderr(&output));
    assert!(!project.file_exists("cache/stamps/ioc-a.stamp"));
}

#[test]
fn test_unknown_target_is_usage_error() {
    let project = TestProject::new();

    let output = project.iocbuild(&["prepare", "ioc-zzz"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("Unknown target 'ioc-zzz'"));
    assert_eq!(project.prepare_runs(), 0);
}

#[test]
fn test_missing_release_fails_without_running_tool() {
    let project = TestProject::new();
    std::fs::remove_file(project.path().join("ioc-a/configure/RELEASE")).unwrap();

    let output = project.iocbuild(&["prepare", TARGET]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("No RELEASE file"));
    assert_eq!(project.prepare_runs(), 0);
}

#[test]
fn test_invalid_project_file_is_usage_error() {
    let project = TestProject::new();
    project.create_file("iocbuild.toml", "[project]\nmax_rounds = 0\n");

    let output = project.iocbuild(&["prepare", TARGET]);

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(project.prepare_runs(), 0);
}
