//! Integration tests for `iocbuild run`
//!
//! `run` is prepare followed by build; a failed prepare never reaches the
//! build tool, and `run` succeeds only when both steps do.

#![cfg(unix)]

mod common;

use common::{stderr, stdout, TestProject, BASE_TAG, TARGET};
use proptest::prelude::*;

#[test]
fn test_run_succeeds_with_resolvable_dependencies() {
    let project = TestProject::new();

    let output = project.iocbuild(&["run", TARGET]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    assert_eq!(project.prepare_runs(), 1);
    assert!(project.file_exists("build.args"));
}

#[test]
fn test_run_twice_fetches_once() {
    let project = TestProject::new();

    assert!(project.iocbuild(&["run", TARGET]).status.success());
    assert!(project.iocbuild(&["run", TARGET]).status.success());

    assert_eq!(project.prepare_runs(), 1);
}

#[test]
fn test_prepare_failure_never_builds() {
    let project = TestProject::new();
    project.prepare_script("echo 'fatal: could not read from remote repository' >&2\nexit 128\n");

    let output = project.iocbuild(&["run", TARGET]);

    assert_eq!(output.status.code(), Some(128));
    assert!(!project.file_exists("build.args"));
}

#[test]
fn test_unreachable_dependency_never_builds() {
    let project = TestProject::new();
    project.prepare_script(&project.fetch_script(&[&format!("epics-base-{BASE_TAG}")]));

    let output = project.iocbuild(&["run", TARGET]);

    assert!(!output.status.success());
    assert!(!project.file_exists("build.args"));
}

#[test]
fn test_build_failure_reports_diagnostics() {
    let project = TestProject::new();
    project.build_script("echo '../devFoo.c:7: undefined reference to asynPrint' >&2\nexit 2\n");

    let output = project.iocbuild(&["run", TARGET]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("undefined reference to asynPrint"));
}

#[test]
fn test_tool_output_bytes_passed_through() {
    let project = TestProject::new();
    project.build_script("printf 'caf\\351 error\\n' >&2\nexit 2\n");

    let output = project.iocbuild(&["run", TARGET]);

    assert_eq!(output.status.code(), Some(2));
    let expected: &[u8] = b"caf\xe9 error";
    assert!(output.stderr.windows(expected.len()).any(|w| w == expected));
}

#[test]
fn test_json_run_keeps_stdout_parseable() {
    let project = TestProject::new();

    let output = project.iocbuild(&["--json", "run", TARGET]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["status"], "success");
}

#[test]
fn test_github_actions_folds_tool_output() {
    let project = TestProject::new();

    let output = project.iocbuild_with_env(&["run", TARGET], &[("GITHUB_ACTIONS", "true")]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert_eq!(out.matches("::group::").count(), 2);
    assert_eq!(out.matches("::endgroup::").count(), 2);
    assert!(out.find("::group::") < out.find("::endgroup::"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// `run` exits 0 exactly when both tools exit 0
    #[test]
    fn test_run_exit_code_follows_tools(prepare_code in 0i32..4, build_code in 0i32..4) {
        let project = TestProject::new();
        let fetch = project.fetch_script(&[&format!("epics-base-{BASE_TAG}"), "asyn-R4.39"]);
        project.prepare_script(&format!("{fetch}exit {prepare_code}\n"));
        project.build_script(&format!("echo \"$@\" > ../build.args\nexit {build_code}\n"));

        let output = project.iocbuild(&["run", TARGET]);

        let expected = if prepare_code != 0 { prepare_code } else { build_code };
        prop_assert_eq!(output.status.code(), Some(expected));
        prop_assert_eq!(project.file_exists("build.args"), prepare_code == 0);
    }
}
