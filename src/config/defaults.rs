//! Default configuration values

/// Project configuration file name
pub const PROJECT_FILE: &str = "iocbuild.toml";

/// Framework tag used when the project does not pin one
pub const DEFAULT_BASE_TAG: &str = "R7.0.2-2.0";

/// Organization hosting module repositories
pub const DEFAULT_REPO_OWNER: &str = "slac-epics";

/// Site roots under which `<base>/modules/<name>/<tag>` paths are recognized
pub const DEFAULT_MODULE_ROOTS: &[&str] = &["/cds/group/pcds/epics", "/reg/g/pcds/epics"];

/// Framework location used while reading RELEASE files
pub const DEFAULT_INTROSPECTION_BASE: &str = "/cds/group/pcds/epics/base/R7.0.2-2.0";

/// Site top used while reading RELEASE files
pub const DEFAULT_INTROSPECTION_SITE_TOP: &str = "/cds/group/pcds/epics";

/// Module tree used while reading RELEASE files
pub const DEFAULT_INTROSPECTION_MODULES: &str = "/cds/group/pcds/epics/R7.0.2-2.0/modules";

/// Upper bound on prepare rounds (discover, fetch, rediscover)
pub const DEFAULT_MAX_ROUNDS: usize = 8;

/// Upper bound on nested RELEASE includes
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Lines of tool output retained for error reports
pub const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Build variable of the framework itself
pub const BASE_VARIABLE: &str = "EPICS_BASE";

/// Module name the framework is cached under
pub const BASE_MODULE_NAME: &str = "epics-base";

/// Default preparation command (the EPICS CI scripts)
pub const DEFAULT_PREPARE_COMMAND: &[&str] = &["python3", "{project}/.ci/cue.py", "prepare"];

/// Default build command, run in the target directory
pub const DEFAULT_BUILD_COMMAND: &[&str] = &["make", "-j{jobs}"];

/// Container image used for `--container` builds
pub const DEFAULT_CONTAINER_IMAGE: &str = "ghcr.io/pcdshub/epics-ci:latest";

/// Environment variables handed to the tools unchanged
pub const DEFAULT_PASSTHROUGH: &[&str] = &[
    "EPICS_BASE",
    "EPICS_MODULES",
    "EPICS_SITE_TOP",
    "EPICS_HOST_ARCH",
];

/// Settings-file prefix overrides (build variable -> prefix)
pub const SET_NAME_OVERRIDES: &[(&str, &str)] = &[("EPICS_BASE", "BASE")];

/// Repository name overrides (module name -> repository)
pub const REPO_NAME_OVERRIDES: &[(&str, &str)] = &[("base", "epics-base")];

/// Variables patched in module RELEASE files besides the dependencies
pub const EXTRA_PATCH_VARIABLES: &[(&str, &str)] = &[("RE2C", "re2c")];
