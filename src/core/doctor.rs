//! Doctor command logic
//!
//! Checks that the external tools a project needs are installed and reports
//! issues with suggestions.

use serde::Serialize;
use std::path::Path;

use crate::core::project::{Project, ProjectConfig};

/// Result of a single dependency check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Name of the dependency being checked
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Version if available
    pub version: Option<String>,
    /// Error message if check failed
    pub error: Option<String>,
    /// Suggestion for fixing the issue
    pub suggestion: Option<String>,
    /// Whether this is a required or optional dependency
    pub required: bool,
}

impl CheckResult {
    /// Create a passing check result
    pub fn pass(name: &str, version: Option<String>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            version,
            error: None,
            suggestion: None,
            required,
        }
    }

    /// Create a failing check result
    pub fn fail(name: &str, error: &str, suggestion: Option<&str>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            version: None,
            error: Some(error.to_string()),
            suggestion: suggestion.map(String::from),
            required,
        }
    }
}

/// Version and revision this binary was built from
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Git revision, when built from a checkout
    pub git_sha: &'static str,
    /// Target triple
    pub target: &'static str,
}

impl BuildInfo {
    /// Information embedded at compile time
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_sha: option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
            target: option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown"),
        }
    }
}

/// Overall doctor report
#[derive(Debug, Serialize)]
pub struct DoctorReport {
    /// This binary
    pub build: BuildInfo,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Configuration issues found
    pub config_issues: Vec<String>,
}

impl Default for DoctorReport {
    fn default() -> Self {
        Self::new()
    }
}

impl DoctorReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            build: BuildInfo::current(),
            checks: Vec::new(),
            config_issues: Vec::new(),
        }
    }

    /// Add a check result
    pub fn add_check(&mut self, result: CheckResult) {
        self.checks.push(result);
    }

    /// Add a configuration issue
    pub fn add_config_issue(&mut self, issue: String) {
        self.config_issues.push(issue);
    }

    /// Check if all required checks passed
    pub fn all_required_passed(&self) -> bool {
        self.checks
            .iter()
            .filter(|c| c.required)
            .all(|c| c.passed)
            && self.config_issues.is_empty()
    }

    /// Check if all checks passed (including optional)
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed) && self.config_issues.is_empty()
    }

    /// Count passed checks
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Count failed checks
    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }
}

/// Version reported by `command --version`, if the command is on PATH
pub fn check_command_available(command: &str) -> Option<String> {
    let path = which::which(command).ok()?;
    let output = std::process::Command::new(path)
        .arg("--version")
        .output()
        .ok()?;

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    Some(extract_version(&combined).unwrap_or_else(|| "unknown version".to_string()))
}

/// Extract version string from command output
fn extract_version(output: &str) -> Option<String> {
    let version_regex = regex::Regex::new(r"v?(\d+\.\d+(?:\.\d+)?(?:-\w+)?)").ok()?;
    version_regex
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Check that a configured tool's program is installed
pub fn check_tool(stage: &str, command: &[String]) -> CheckResult {
    let name = format!("{stage} tool");
    let Some(program) = command.first() else {
        return CheckResult::fail(
            &name,
            "No command configured",
            Some("Set the command under [tools] in iocbuild.toml"),
            true,
        );
    };

    if program.contains('{') {
        return CheckResult::pass(&name, None, true);
    }

    match check_command_available(program) {
        Some(version) => CheckResult::pass(&format!("{name} ({program})"), Some(version), true),
        None => CheckResult::fail(
            &format!("{name} ({program})"),
            &format!("{program} not found in PATH"),
            Some("Install it or change the command under [tools] in iocbuild.toml"),
            true,
        ),
    }
}

/// Check Git availability
pub fn check_git() -> CheckResult {
    match check_command_available("git") {
        Some(version) => CheckResult::pass("Git", Some(version), true),
        None => CheckResult::fail(
            "Git",
            "Git not found in PATH",
            Some("The preparation tool clones modules with git; install it from https://git-scm.com/"),
            true,
        ),
    }
}

/// Check GNU make availability
pub fn check_make() -> CheckResult {
    match check_command_available("make") {
        Some(version) => CheckResult::pass("GNU make", Some(version), true),
        None => CheckResult::fail(
            "GNU make",
            "make not found in PATH",
            Some("Install GNU make with your package manager"),
            true,
        ),
    }
}

/// Check Docker/Podman availability
pub fn check_container_runtime(required: bool) -> CheckResult {
    if let Some(version) = check_command_available("docker") {
        return CheckResult::pass("Container runtime (Docker)", Some(version), required);
    }
    if let Some(version) = check_command_available("podman") {
        return CheckResult::pass("Container runtime (Podman)", Some(version), required);
    }
    CheckResult::fail(
        "Container runtime",
        "Neither Docker nor Podman found in PATH",
        Some("Install Docker or Podman for containerized builds"),
        required,
    )
}

/// Problems with the project's targets
pub fn check_project(project: &Project) -> Vec<String> {
    project
        .targets()
        .values()
        .filter(|target| !target.release_path().is_file())
        .map(|target| {
            format!(
                "Target '{}' has no {}",
                target.name,
                target.release_path().display()
            )
        })
        .collect()
}

/// Run all doctor checks
pub fn run_doctor(project_dir: &Path, explicit_config: Option<&Path>) -> DoctorReport {
    let mut report = DoctorReport::new();

    let project = match Project::load(project_dir, explicit_config) {
        Ok(project) => Some(project),
        Err(e) => {
            report.add_config_issue(e.to_string());
            None
        }
    };
    let config = project
        .as_ref()
        .map_or_else(ProjectConfig::default, |p| p.config.clone());

    report.add_check(check_tool("prepare", &config.prepare_command()));
    report.add_check(check_tool("build", &config.build_command()));
    report.add_check(check_git());
    report.add_check(check_make());
    report.add_check(check_container_runtime(
        config.container.enabled.unwrap_or(false),
    ));

    if let Some(project) = &project {
        for issue in check_project(project) {
            report.add_config_issue(issue);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_check_result_pass() {
        let result = CheckResult::pass("test", Some("1.0.0".to_string()), true);
        assert!(result.passed);
        assert_eq!(result.name, "test");
        assert_eq!(result.version, Some("1.0.0".to_string()));
        assert!(result.required);
    }

    #[test]
    fn test_check_result_fail() {
        let result = CheckResult::fail("test", "error", Some("suggestion"), false);
        assert!(!result.passed);
        assert_eq!(result.error, Some("error".to_string()));
        assert_eq!(result.suggestion, Some("suggestion".to_string()));
        assert!(!result.required);
    }

    #[test]
    fn test_doctor_report_counts() {
        let mut report = DoctorReport::new();
        report.add_check(CheckResult::pass("a", None, true));
        report.add_check(CheckResult::fail("b", "err", None, false));
        report.add_check(CheckResult::pass("c", None, false));

        assert_eq!(report.passed_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert!(!report.all_passed());
        assert!(report.all_required_passed());

        report.add_config_issue("broken".to_string());
        assert!(!report.all_required_passed());
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(extract_version("GNU Make 4.3"), Some("4.3".to_string()));
        assert_eq!(extract_version("git version 2.39.0"), Some("2.39.0".to_string()));
        assert_eq!(extract_version("Python 3.11.4"), Some("3.11.4".to_string()));
        assert_eq!(extract_version("no digits"), None);
    }

    #[test]
    fn test_missing_tool_fails() {
        let result = check_tool(
            "prepare",
            &["iocbuild-test-no-such-program".to_string()],
        );
        assert!(!result.passed);
        assert!(result.required);
    }

    #[test]
    fn test_empty_tool_command_fails() {
        assert!(!check_tool("build", &[]).passed);
    }

    #[test]
    fn test_project_without_release_reported() {
        let temp = TempDir::new().unwrap();
        let project = Project::with_config(PathBuf::from(temp.path()), ProjectConfig::default());
        let issues = check_project(&project);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("configure/RELEASE"));
    }

    #[test]
    fn test_build_info_has_version() {
        assert_eq!(BuildInfo::current().version, env!("CARGO_PKG_VERSION"));
    }
}
