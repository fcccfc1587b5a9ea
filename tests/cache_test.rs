//! Integration tests for `iocbuild cache`

#![cfg(unix)]

mod common;

use assert_fs::prelude::*;
use common::{stderr, stdout, TestProject, TARGET};
use predicates::prelude::*;

#[test]
fn test_cache_info_on_empty_cache() {
    let project = TestProject::new();

    let output = project.iocbuild(&["--json", "cache", "info"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["exists"], false);
    assert_eq!(json["module_count"], 0);
}

#[test]
fn test_cache_info_counts_fetched_modules() {
    let project = TestProject::new();
    assert!(project.iocbuild(&["prepare", TARGET]).status.success());

    let output = project.iocbuild(&["--json", "cache", "info"]);

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["exists"], true);
    assert_eq!(json["module_count"], 2);
    assert_eq!(json["path"], project.cache_path().display().to_string());
}

#[test]
fn test_cache_clean_removes_cache() {
    let project = TestProject::new();
    assert!(project.iocbuild(&["prepare", TARGET]).status.success());

    let output = project.iocbuild(&["cache", "clean"]);

    assert!(output.status.success());
    assert!(predicate::str::contains("Cache cleared").eval(&stdout(&output)));
    assert!(predicate::path::missing().eval(&project.cache_path()));
}

#[test]
fn test_cache_clean_on_empty_cache() {
    let project = TestProject::new();

    let output = project.iocbuild(&["cache", "clean"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("already empty"));
}

#[test]
fn test_cache_dir_flag_overrides_environment() {
    let project = TestProject::new();
    let other = assert_fs::TempDir::new().unwrap();
    let cache = other.child("elsewhere");

    let output = project.iocbuild(&[
        "prepare",
        TARGET,
        "--cache-dir",
        cache.path().to_str().unwrap(),
    ]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    cache.child("modules/asyn-R4.39").assert(predicate::path::is_dir());
    cache.child("sets/ioc-a.set").assert(predicate::str::contains("ASYN=R4.39"));
    assert!(!project.cache_path().join("modules").exists());
}
