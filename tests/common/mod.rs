//! Common test utilities and helpers
//!
//! This module provides a throwaway iocbuild project whose preparation and
//! build tools are shell scripts, so integration tests can drive the real
//! binary without network access or an EPICS installation.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Framework tag used by the test project
pub const BASE_TAG: &str = "R7.0.2-2.0";

/// Target declared by the test project
pub const TARGET: &str = "ioc-a";

/// Project file pointing both tools at scripts under `tools/`
pub const PROJECT_TOML: &str = r#"
[project]
base_tag = "R7.0.2-2.0"
module_roots = ["/opt/epics"]
max_rounds = 3

[introspection]
epics_base = "/opt/epics/base/R7.0.2-2.0"
epics_site_top = "/opt/epics"
epics_modules = "/opt/epics/R7.0.2-2.0/modules"

[targets.ioc-a]
path = "ioc-a"

[tools]
prepare = ["sh", "{project}/tools/prepare.sh"]
build = ["sh", "{project}/tools/build.sh"]

[build]
host_arch = "linux-x86_64"
compiler = "gcc"
jobs = 2
"#;

/// Target RELEASE depending on asyn
pub const RELEASE: &str = "\
EPICS_BASE=/opt/epics/base/R7.0.2-2.0
ASYN=$(EPICS_MODULES)/asyn/R4.39
";

/// Test project context
///
/// Creates a temporary directory holding `iocbuild.toml`, the `ioc-a`
/// target, tool scripts and a cache directory.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Project whose tools fetch every dependency and build successfully
    pub fn new() -> Self {
        let project = Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        };
        project.create_file("iocbuild.toml", PROJECT_TOML);
        project.create_file("ioc-a/configure/RELEASE", RELEASE);
        project.create_file("ioc-a/Makefile", "TOP = .\n");
        project.prepare_script(&project.fetch_script(&[
            &format!("epics-base-{BASE_TAG}"),
            "asyn-R4.39",
        ]));
        project.build_script("echo \"$@\" > ../build.args\necho build-ok\n");
        project
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Cache directory used by every invocation
    pub fn cache_path(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Cache location of a module checkout
    pub fn module_dir(&self, dir_name: &str) -> PathBuf {
        self.cache_path().join("modules").join(dir_name)
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Replace the preparation tool; it always counts its runs first
    pub fn prepare_script(&self, body: &str) {
        self.create_file("tools/prepare.sh", &format!("echo run >> prepare.count\n{body}"));
    }

    /// Replace the build tool
    pub fn build_script(&self, body: &str) {
        self.create_file("tools/build.sh", body);
    }

    /// Script body populating module directories under `$CACHEDIR`
    pub fn fetch_script(&self, dirs: &[&str]) -> String {
        dirs.iter()
            .map(|dir| {
                format!("mkdir -p \"$CACHEDIR/{dir}\"\necho 'TOP = .' > \"$CACHEDIR/{dir}/Makefile\"\n")
            })
            .collect()
    }

    /// Times the preparation tool ran
    pub fn prepare_runs(&self) -> usize {
        if !self.file_exists("prepare.count") {
            return 0;
        }
        self.read_file("prepare.count").lines().count()
    }

    /// Run iocbuild in the project directory
    pub fn iocbuild(&self, args: &[&str]) -> Output {
        self.iocbuild_with_env(args, &[])
    }

    /// Run iocbuild with extra environment variables
    pub fn iocbuild_with_env(&self, args: &[&str], vars: &[(&str, &str)]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_iocbuild"))
            .current_dir(self.path())
            .env("IOCBUILD_CACHE_DIR", self.cache_path())
            .env_remove("EPICS_HOST_ARCH")
            .env_remove("CMP")
            .env_remove("RUST_LOG")
            .env_remove("GITHUB_ACTIONS")
            .envs(vars.iter().copied())
            .args(args)
            .output()
            .expect("Failed to execute iocbuild")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Stdout of a finished invocation
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Stderr of a finished invocation
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
