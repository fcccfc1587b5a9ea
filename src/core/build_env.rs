//! Build environment setup
//!
//! Provides the environment both external tools run with: the EPICS host
//! architecture and compiler, the cache locations the CI scripts read
//! (`CACHEDIR`, `SETUP_PATH`, `SET`), and variables passed through from the
//! invoking environment.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::cache::CacheDirectory;
use crate::core::project::ProjectConfig;
use crate::error::EnvError;

/// Variables of the invoking process
///
/// Captured once so that resolution is deterministic and testable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Snapshot with exactly the given variables
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Value of `key`, ignoring empty values
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Environment for the preparation and build tools
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEnvironment {
    /// EPICS host architecture (e.g., "linux-x86_64")
    pub host_arch: String,
    /// Compiler identifier understood by the CI scripts (e.g., "gcc")
    pub compiler: String,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Runner OS name for the CI scripts
    pub runner_os: String,
    /// Module checkout directory
    pub cache_dir: PathBuf,
    /// Directory holding settings files
    pub setup_path: PathBuf,
    /// Settings file name, without `.set`
    pub set_name: String,
    /// Variables passed through unchanged
    pub passthrough: BTreeMap<String, String>,
    /// Additional environment variables
    pub extra_env: BTreeMap<String, String>,
    /// Whether `GITHUB_ACTIONS` is already set by the caller
    inherited_ci: bool,
}

impl BuildEnvironment {
    /// Resolve the environment for `target` from configuration and the
    /// invoking environment
    ///
    /// `EPICS_HOST_ARCH` and `CMP` in the invoking environment override the
    /// configuration; platform defaults fill whatever is left.
    pub fn resolve(
        config: &ProjectConfig,
        cache: &CacheDirectory,
        target: &str,
        snapshot: &EnvSnapshot,
    ) -> Self {
        let host_arch = snapshot
            .get("EPICS_HOST_ARCH")
            .map(ToString::to_string)
            .or_else(|| config.build.host_arch.clone())
            .unwrap_or_else(|| default_host_arch().to_string());

        let compiler = snapshot
            .get("CMP")
            .map(ToString::to_string)
            .or_else(|| config.build.compiler.clone())
            .unwrap_or_else(|| default_compiler().to_string());

        let passthrough = config
            .passthrough()
            .into_iter()
            .filter_map(|key| snapshot.get(&key).map(|v| (key.clone(), v.to_string())))
            .collect();

        Self {
            host_arch,
            compiler,
            jobs: config.build.jobs.unwrap_or_else(num_cpus::get),
            runner_os: runner_os().to_string(),
            cache_dir: cache.modules_dir(),
            setup_path: cache.sets_dir(),
            set_name: target.to_string(),
            passthrough,
            extra_env: config.build.env.clone(),
            inherited_ci: snapshot.get("GITHUB_ACTIONS").is_some(),
        }
    }

    /// Set the number of parallel jobs
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Convert to environment variable map for process execution
    pub fn to_env_map(&self) -> BTreeMap<String, String> {
        let mut env = self.passthrough.clone();

        env.insert("EPICS_HOST_ARCH".to_string(), self.host_arch.clone());
        env.insert("CMP".to_string(), self.compiler.clone());
        env.insert("CACHEDIR".to_string(), self.cache_dir.display().to_string());
        env.insert("SETUP_PATH".to_string(), self.setup_path.display().to_string());
        env.insert("SET".to_string(), self.set_name.clone());
        env.insert("RUNNER_OS".to_string(), self.runner_os.clone());
        env.insert("JOBS".to_string(), self.jobs.to_string());

        // The CI scripts refuse to run unless they believe they are in CI
        if !self.inherited_ci {
            env.insert("GITHUB_ACTIONS".to_string(), "1".to_string());
        }

        for (key, value) in &self.extra_env {
            env.insert(key.clone(), value.clone());
        }

        env
    }

    /// Check if all required environment variables are set
    pub fn validate(&self) -> Result<(), EnvError> {
        if self.host_arch.is_empty() {
            return Err(EnvError::MissingVariable("EPICS_HOST_ARCH".to_string()));
        }
        if self.compiler.is_empty() {
            return Err(EnvError::MissingVariable("CMP".to_string()));
        }
        if self.jobs == 0 {
            return Err(EnvError::InvalidValue {
                variable: "JOBS".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.host_arch.contains(char::is_whitespace) {
            return Err(EnvError::InvalidValue {
                variable: "EPICS_HOST_ARCH".to_string(),
                reason: format!("'{}' contains whitespace", self.host_arch),
            });
        }
        Ok(())
    }
}

/// EPICS host architecture of this machine
pub fn default_host_arch() -> &'static str {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "aarch64") => "linux-aarch64",
        ("linux", "x86") => "linux-x86",
        ("macos", "aarch64") => "darwin-aarch64",
        ("macos", _) => "darwin-x86",
        ("windows", _) => "windows-x64",
        _ => "linux-x86_64",
    }
}

/// Compiler the CI scripts expect on this platform
pub fn default_compiler() -> &'static str {
    if cfg!(target_os = "macos") {
        "gcc-12"
    } else {
        "gcc"
    }
}

/// Runner OS name as the CI scripts spell it
pub fn runner_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "macOS",
        "windows" => "Windows",
        _ => "Linux",
    }
}
