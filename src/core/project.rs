//! Project configuration management
//!
//! Reads `iocbuild.toml` from the project directory. Every section is
//! optional; a project without the file builds the project directory itself
//! as its only target, against the default site layout.
//!
//! ```toml
//! [project]
//! base_tag = "R7.0.2-2.0"
//! repo_owner = "slac-epics"
//!
//! [targets.ioc-tst]
//! path = "iocs/ioc-tst"
//!
//! [tools]
//! prepare = ["python3", "{project}/.ci/cue.py", "prepare"]
//! build = ["make", "-j{jobs}"]
//!
//! [build]
//! host_arch = "linux-x86_64"
//! compiler = "gcc"
//!
//! [container]
//! enabled = true
//! image = "ghcr.io/pcdshub/epics-ci:latest"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::core::target::Target;
use crate::error::{ConfigError, ResolveError};

/// Contents of `iocbuild.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Site and cache settings
    #[serde(default)]
    pub project: ProjectSettings,

    /// Paths substituted while reading RELEASE files
    #[serde(default)]
    pub introspection: IntrospectionPaths,

    /// Declared build targets by name
    #[serde(default)]
    pub targets: BTreeMap<String, TargetConfig>,

    /// External tool command lines
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Build environment settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Containerized build settings
    #[serde(default)]
    pub container: ContainerSettings,
}

/// Site and cache settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSettings {
    /// Framework tag to build against
    pub base_tag: Option<String>,

    /// Organization hosting module repositories
    pub repo_owner: Option<String>,

    /// Site roots recognized in module paths
    pub module_roots: Option<Vec<String>>,

    /// Cache directory (relative to the project)
    pub cache_dir: Option<PathBuf>,

    /// Upper bound on discover/fetch rounds
    pub max_rounds: Option<usize>,
}

/// Site paths used while reading RELEASE files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntrospectionPaths {
    /// Value of `EPICS_BASE`
    pub epics_base: Option<PathBuf>,

    /// Value of `EPICS_SITE_TOP`
    pub epics_site_top: Option<PathBuf>,

    /// Value of `EPICS_MODULES`
    pub epics_modules: Option<PathBuf>,
}

impl IntrospectionPaths {
    /// Variables predefined before any RELEASE line is read
    pub fn to_variables(&self) -> BTreeMap<String, String> {
        let pick = |value: &Option<PathBuf>, default: &str| {
            value
                .as_ref()
                .map_or_else(|| default.to_string(), |p| p.display().to_string())
        };

        BTreeMap::from([
            (
                "EPICS_BASE".to_string(),
                pick(&self.epics_base, defaults::DEFAULT_INTROSPECTION_BASE),
            ),
            (
                "EPICS_SITE_TOP".to_string(),
                pick(&self.epics_site_top, defaults::DEFAULT_INTROSPECTION_SITE_TOP),
            ),
            (
                "EPICS_MODULES".to_string(),
                pick(&self.epics_modules, defaults::DEFAULT_INTROSPECTION_MODULES),
            ),
        ])
    }
}

/// A declared target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Source directory (relative to the project)
    pub path: PathBuf,
}

/// External tool command lines
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Dependency preparation command
    pub prepare: Option<Vec<String>>,

    /// Build command, run in the target directory
    pub build: Option<Vec<String>>,
}

/// Build environment settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Host architecture (`EPICS_HOST_ARCH`)
    pub host_arch: Option<String>,

    /// Compiler identifier (`CMP`)
    pub compiler: Option<String>,

    /// Parallel make jobs
    pub jobs: Option<usize>,

    /// Variables passed through from the invoking environment
    pub passthrough: Option<Vec<String>>,

    /// Append `VAR=<cache path>` for every dependency to the build command
    pub release_overrides: Option<bool>,

    /// Extra variables for both tools
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Containerized build settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerSettings {
    /// Build inside a container by default
    pub enabled: Option<bool>,

    /// Image to build in
    pub image: Option<String>,

    /// `docker` or `podman`; detected when unset
    pub runtime: Option<String>,
}

impl ProjectConfig {
    /// Parse configuration text
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::from_toml(&content, path)
    }

    /// Framework tag to build against
    #[must_use]
    pub fn base_tag(&self) -> &str {
        self.project
            .base_tag
            .as_deref()
            .unwrap_or(defaults::DEFAULT_BASE_TAG)
    }

    /// Organization hosting module repositories
    #[must_use]
    pub fn repo_owner(&self) -> &str {
        self.project
            .repo_owner
            .as_deref()
            .unwrap_or(defaults::DEFAULT_REPO_OWNER)
    }

    /// Site roots recognized in module paths
    #[must_use]
    pub fn module_roots(&self) -> Vec<String> {
        self.project.module_roots.clone().unwrap_or_else(|| {
            defaults::DEFAULT_MODULE_ROOTS
                .iter()
                .map(ToString::to_string)
                .collect()
        })
    }

    /// Upper bound on discover/fetch rounds
    #[must_use]
    pub fn max_rounds(&self) -> usize {
        self.project
            .max_rounds
            .unwrap_or(defaults::DEFAULT_MAX_ROUNDS)
    }

    /// Dependency preparation command line
    #[must_use]
    pub fn prepare_command(&self) -> Vec<String> {
        self.tools
            .prepare
            .clone()
            .unwrap_or_else(|| to_strings(defaults::DEFAULT_PREPARE_COMMAND))
    }

    /// Build command line
    #[must_use]
    pub fn build_command(&self) -> Vec<String> {
        self.tools
            .build
            .clone()
            .unwrap_or_else(|| to_strings(defaults::DEFAULT_BUILD_COMMAND))
    }

    /// Variables passed through from the invoking environment
    #[must_use]
    pub fn passthrough(&self) -> Vec<String> {
        self.build
            .passthrough
            .clone()
            .unwrap_or_else(|| to_strings(defaults::DEFAULT_PASSTHROUGH))
    }

    /// Whether dependency paths are appended to the build command
    #[must_use]
    pub fn release_overrides(&self) -> bool {
        self.build.release_overrides.unwrap_or(true)
    }

    /// Container image for containerized builds
    #[must_use]
    pub fn container_image(&self) -> &str {
        self.container
            .image
            .as_deref()
            .unwrap_or(defaults::DEFAULT_CONTAINER_IMAGE)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds() == 0 {
            return Err(ConfigError::Invalid {
                message: "project.max_rounds must be at least 1".to_string(),
            });
        }
        if self.build.jobs == Some(0) {
            return Err(ConfigError::Invalid {
                message: "build.jobs must be at least 1".to_string(),
            });
        }
        if self.module_roots().is_empty() {
            return Err(ConfigError::Invalid {
                message: "project.module_roots must name at least one root".to_string(),
            });
        }
        Ok(())
    }
}

/// A loaded project: its root directory and configuration
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory containing `iocbuild.toml`
    pub root: PathBuf,
    /// Parsed configuration
    pub config: ProjectConfig,
}

impl Project {
    /// Load the project rooted at `dir`, or at the directory of an explicit
    /// config file
    ///
    /// An explicit config file must exist.
    pub fn load(dir: &Path, explicit_config: Option<&Path>) -> Result<Self, ConfigError> {
        let (root, config_path) = match explicit_config {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    dir.join(path)
                };
                if !path.is_file() {
                    return Err(ConfigError::Read {
                        path,
                        error: "file not found".to_string(),
                    });
                }
                let root = path.parent().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
                (root, path)
            }
            None => (dir.to_path_buf(), dir.join(defaults::PROJECT_FILE)),
        };

        let config = ProjectConfig::load_from_path(&config_path)?;
        config.validate()?;
        tracing::debug!("Loaded project at {}", root.display());

        Ok(Self { root, config })
    }

    /// Create a project from an already parsed configuration
    pub fn with_config(root: PathBuf, config: ProjectConfig) -> Self {
        Self { root, config }
    }

    /// All declared targets by name
    ///
    /// Without a `[targets]` table the project directory is the only target.
    pub fn targets(&self) -> BTreeMap<String, Target> {
        if self.config.targets.is_empty() {
            let name = self
                .root
                .file_name()
                .map_or_else(|| "ioc".to_string(), |n| n.to_string_lossy().into_owned());
            return BTreeMap::from([(name.clone(), Target::new(name, self.root.clone()))]);
        }

        self.config
            .targets
            .iter()
            .map(|(name, cfg)| {
                let path = if cfg.path.is_absolute() {
                    cfg.path.clone()
                } else {
                    self.root.join(&cfg.path)
                };
                (name.clone(), Target::new(name.clone(), path))
            })
            .collect()
    }

    /// Look up a declared target
    pub fn target(&self, name: &str) -> Result<Target, ResolveError> {
        let mut targets = self.targets();
        targets
            .remove(name)
            .ok_or_else(|| ResolveError::UnknownTarget {
                name: name.to_string(),
                known: targets.into_keys().collect(),
            })
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ProjectConfig::default();
        assert_eq!(config.base_tag(), defaults::DEFAULT_BASE_TAG);
        assert_eq!(config.repo_owner(), "slac-epics");
        assert_eq!(config.module_roots().len(), 2);
        assert_eq!(config.build_command(), vec!["make", "-j{jobs}"]);
        assert!(config.release_overrides());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = ProjectConfig::load_from_path(&temp_dir.path().join("iocbuild.toml")).unwrap();
        assert!(config.targets.is_empty());
    }

    #[test]
    fn test_load_valid_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("iocbuild.toml");
        fs::write(
            &path,
            r#"
[project]
base_tag = "R7.0.3.1-2.0"
module_roots = ["/site/epics"]

[targets.ioc-a]
path = "iocs/a"

[tools]
prepare = ["sh", "prep.sh"]

[build]
host_arch = "linux-x86_64"
jobs = 2

[build.env]
EXTRA = "1"
"#,
        )
        .unwrap();

        let config = ProjectConfig::load_from_path(&path).unwrap();
        assert_eq!(config.base_tag(), "R7.0.3.1-2.0");
        assert_eq!(config.module_roots(), vec!["/site/epics"]);
        assert_eq!(config.prepare_command(), vec!["sh", "prep.sh"]);
        assert_eq!(config.build.jobs, Some(2));
        assert_eq!(config.build.env.get("EXTRA").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ProjectConfig::from_toml("[project]\nbase = \"x\"\n", Path::new("iocbuild.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_rounds_invalid() {
        let mut config = ProjectConfig::default();
        config.project.max_rounds = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_implicit_target_is_project_dir() {
        let temp_dir = TempDir::new().unwrap();
        let project = Project::load(temp_dir.path(), None).unwrap();
        let targets = project.targets();
        assert_eq!(targets.len(), 1);
        let target = targets.values().next().unwrap();
        assert_eq!(target.path, temp_dir.path());
    }

    #[test]
    fn test_declared_target_lookup() {
        let project = Project::with_config(
            PathBuf::from("/work"),
            ProjectConfig::from_toml(
                "[targets.ioc-a]\npath = \"iocs/a\"\n[targets.ioc-b]\npath = \"/abs/b\"\n",
                Path::new("iocbuild.toml"),
            )
            .unwrap(),
        );

        assert_eq!(project.target("ioc-a").unwrap().path, PathBuf::from("/work/iocs/a"));
        assert_eq!(project.target("ioc-b").unwrap().path, PathBuf::from("/abs/b"));

        match project.target("ioc-c") {
            Err(ResolveError::UnknownTarget { known, .. }) => {
                assert_eq!(known, vec!["ioc-a", "ioc-b"]);
            }
            other => panic!("expected unknown target, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = Project::load(temp_dir.path(), Some(Path::new("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_introspection_defaults() {
        let vars = IntrospectionPaths::default().to_variables();
        assert_eq!(
            vars.get("EPICS_SITE_TOP").map(String::as_str),
            Some(defaults::DEFAULT_INTROSPECTION_SITE_TOP)
        );
    }
}
