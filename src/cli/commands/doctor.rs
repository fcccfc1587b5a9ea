//! CLI command for `iocbuild doctor`
//!
//! Checks that the tools a project needs are installed and reports issues
//! with suggestions.

use anyhow::Result;
use std::path::Path;

use crate::cli::output::{is_json, is_quiet, print_detail, print_info, print_success, print_warning, status};
use crate::core::doctor::run_doctor;

/// Execute the doctor command
pub async fn execute(project_dir: &Path, explicit_config: Option<&Path>) -> Result<()> {
    let report = run_doctor(project_dir, explicit_config);

    // JSON output mode
    if is_json() {
        let json_result = serde_json::json!({
            "status": if report.all_passed() { "success" } else if report.all_required_passed() { "warning" } else { "error" },
            "build": report.build,
            "checks": report.checks,
            "config_issues": report.config_issues,
            "passed_count": report.passed_count(),
            "total_count": report.checks.len()
        });
        println!("{}", serde_json::to_string_pretty(&json_result).unwrap_or_default());

        if !report.all_required_passed() {
            return Err(anyhow::anyhow!("Missing required dependencies"));
        }
        return Ok(());
    }

    // Quiet mode - only show errors
    if is_quiet() {
        if report.all_required_passed() {
            return Ok(());
        }
        for check in report.checks.iter().filter(|c| c.required && !c.passed) {
            eprintln!("{} Missing required: {}", status::ERROR, check.name);
        }
        for issue in &report.config_issues {
            eprintln!("{} {issue}", status::ERROR);
        }
        return Err(anyhow::anyhow!("Missing required dependencies"));
    }

    print_info(&format!(
        "iocbuild {} ({}, {})",
        report.build.version, report.build.git_sha, report.build.target
    ));
    print_info("Checking system dependencies...");
    println!();

    for check in &report.checks {
        let version_str = check
            .version
            .as_ref()
            .map(|v| format!(" (v{v})"))
            .unwrap_or_default();

        let required_str = if check.required { "" } else { " [optional]" };

        if check.passed {
            println!("  {} {}{version_str}{required_str}", status::SUCCESS, check.name);
        } else {
            println!("  {} {}{required_str}", status::ERROR, check.name);
            if let Some(error) = &check.error {
                print_detail(&format!("Error: {error}"));
            }
            if let Some(suggestion) = &check.suggestion {
                print_detail(&format!("Suggestion: {suggestion}"));
            }
        }
    }

    if !report.config_issues.is_empty() {
        println!();
        print_warning("Configuration issues:");
        for issue in &report.config_issues {
            print_detail(&format!("• {issue}"));
        }
    }

    println!();
    let passed = report.passed_count();
    let total = report.checks.len();

    if report.all_passed() {
        print_success(&format!("All checks passed ({passed}/{total})"));
    } else if report.all_required_passed() {
        print_warning(&format!(
            "{passed}/{total} checks passed (optional dependencies missing)"
        ));
    } else {
        println!("{} {passed}/{total} checks passed", status::ERROR);
        return Err(anyhow::anyhow!(
            "Missing required dependencies or configuration problems"
        ));
    }

    Ok(())
}
