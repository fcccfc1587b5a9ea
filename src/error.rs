//! Error types for iocbuild
//!
//! Domain-specific error types using thiserror.
//!
//! Failures of the external tools carry the tool's exit code so that the
//! process can exit with it unchanged (see [`IocbuildError::exit_code`]).

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for orchestrator failures that are not a tool's own exit code
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for configuration and environment problems
pub const EXIT_USAGE: i32 = 2;

/// Exit code used when an external program could not be started
pub const EXIT_NOT_FOUND: i32 = 127;

/// Dependency resolution and preparation errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Target is not declared in the project
    #[error("Unknown target '{name}'. Declared targets: {}", known.join(", "))]
    UnknownTarget { name: String, known: Vec<String> },

    /// Target has no RELEASE file to read dependencies from
    #[error("No RELEASE file found for target '{target}' at '{path}'")]
    MissingRelease { target: String, path: PathBuf },

    /// RELEASE file exists but cannot be read
    #[error("Failed to read RELEASE file '{path}': {error}")]
    UnreadableRelease { path: PathBuf, error: String },

    /// Nested includes went too deep
    #[error("Include depth exceeded while reading '{path}'")]
    IncludeDepth { path: PathBuf },

    /// Preparation tool exited non-zero
    #[error("Dependency preparation for '{target}' failed with exit code {code}")]
    PrepareFailed { target: String, code: i32 },

    /// Preparation tool succeeded but dependencies are still absent
    #[error("Dependencies still missing from cache after preparation: {}", missing.join(", "))]
    Unresolved { missing: Vec<String> },
}

/// Build errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// Build requested before a successful prepare
    #[error("Target '{target}' is not prepared ({reason}). Run 'iocbuild prepare {target}' first")]
    NotPrepared { target: String, reason: String },

    /// Build tool exited non-zero
    #[error("Build of '{target}' failed with exit code {code}")]
    BuildFailed { target: String, code: i32 },
}

/// Build environment errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    /// Required variable is missing
    #[error("Missing required environment variable: {0}")]
    MissingVariable(String),

    /// Variable has invalid value
    #[error("Invalid value for {variable}: {reason}")]
    InvalidValue { variable: String, reason: String },
}

/// External tool invocation errors
#[derive(Error, Debug)]
pub enum ToolError {
    /// The program could not be started
    #[error("Failed to start '{program}': {error}")]
    Spawn { program: String, error: String },

    /// Configured command line is empty
    #[error("No command configured for the {stage} step")]
    EmptyCommand { stage: String },

    /// Failure while waiting on or streaming from the child
    #[error("I/O error while running '{program}': {error}")]
    Io { program: String, error: String },

    /// Container runtime requested but unavailable
    #[error("Container runtime not available. Install Docker or Podman, or build without --container")]
    RuntimeNotAvailable,
}

/// Project configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Failed to parse config file
    #[error("Failed to parse config file '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// A configured value is unusable
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to create a link
    #[error("Failed to link '{link}' to '{target}': {error}")]
    Link {
        link: PathBuf,
        target: PathBuf,
        error: String,
    },
}

/// Top-level iocbuild error type
#[derive(Error, Debug)]
pub enum IocbuildError {
    /// Resolution error
    #[error("Dependency resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Build error
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Environment error
    #[error("Environment error: {0}")]
    Env(#[from] EnvError),

    /// Tool error
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Config error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}

impl IocbuildError {
    /// Process exit code for this error
    ///
    /// Tool failures forward the tool's own exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Resolve(ResolveError::PrepareFailed { code, .. })
            | Self::Build(BuildError::BuildFailed { code, .. }) => nonzero(*code),
            Self::Tool(ToolError::Spawn { .. }) => EXIT_NOT_FOUND,
            Self::Env(_) | Self::Config(_) | Self::Resolve(ResolveError::UnknownTarget { .. }) => {
                EXIT_USAGE
            }
            _ => EXIT_FAILURE,
        }
    }
}

/// A failure must never map to exit status 0
fn nonzero(code: i32) -> i32 {
    if code == 0 {
        EXIT_FAILURE
    } else {
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_failure_forwards_tool_code() {
        let err = IocbuildError::from(ResolveError::PrepareFailed {
            target: "ioc-a".to_string(),
            code: 128,
        });
        assert_eq!(err.exit_code(), 128);
    }

    #[test]
    fn test_build_failure_forwards_tool_code() {
        let err = IocbuildError::from(BuildError::BuildFailed {
            target: "ioc-a".to_string(),
            code: 2,
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_zero_code_never_reported_as_success() {
        let err = IocbuildError::from(BuildError::BuildFailed {
            target: "ioc-a".to_string(),
            code: 0,
        });
        assert_eq!(err.exit_code(), EXIT_FAILURE);
    }

    #[test]
    fn test_environment_errors_are_usage_errors() {
        let err = IocbuildError::from(EnvError::MissingVariable("EPICS_HOST_ARCH".to_string()));
        assert_eq!(err.exit_code(), EXIT_USAGE);
    }

    #[test]
    fn test_unknown_target_message_lists_known() {
        let err = ResolveError::UnknownTarget {
            name: "nope".to_string(),
            known: vec!["ioc-a".to_string(), "ioc-b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown target 'nope'. Declared targets: ioc-a, ioc-b"
        );
    }
}
