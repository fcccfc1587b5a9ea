//! Containerized builds using Docker/Podman
//!
//! Wraps a [`ToolCommand`] in a `run --rm` of the configured image. The cache
//! and the target source tree are bind-mounted at their host paths, so every
//! path in the build environment means the same thing inside the container.

use std::path::PathBuf;

use crate::error::ToolError;
use crate::infra::process::ToolCommand;

/// Container runtime type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    /// Docker container runtime
    Docker,
    /// Podman container runtime
    Podman,
}

impl ContainerRuntime {
    /// Get the command name for this runtime
    pub fn command(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Podman => "podman",
        }
    }

    /// Parse a configured runtime name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "docker" => Some(Self::Docker),
            "podman" => Some(Self::Podman),
            _ => None,
        }
    }

    /// Detect an installed runtime, preferring Docker
    pub fn detect() -> Option<Self> {
        [Self::Docker, Self::Podman]
            .into_iter()
            .find(|runtime| which::which(runtime.command()).is_ok())
    }
}

/// Bind mount of a host directory into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    /// Host path to mount
    pub host_path: PathBuf,
    /// Container path to mount to
    pub container_path: PathBuf,
    /// Whether the mount is read-only
    pub read_only: bool,
}

impl MountConfig {
    /// Mount a host directory read-write at the same path
    pub fn same_path(path: PathBuf) -> Self {
        Self {
            container_path: path.clone(),
            host_path: path,
            read_only: false,
        }
    }

    fn to_arg(&self) -> String {
        let suffix = if self.read_only { ":ro" } else { "" };
        format!(
            "-v={}:{}{suffix}",
            self.host_path.display(),
            self.container_path.display()
        )
    }
}

/// Container settings for one build
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Runtime to invoke
    pub runtime: ContainerRuntime,
    /// Image to run
    pub image: String,
    /// Bind mounts
    pub mounts: Vec<MountConfig>,
    /// Working directory inside the container
    pub workdir: Option<PathBuf>,
}

impl ContainerConfig {
    /// Create a config for `image` on `runtime`
    pub fn new(runtime: ContainerRuntime, image: impl Into<String>) -> Self {
        Self {
            runtime,
            image: image.into(),
            mounts: Vec::new(),
            workdir: None,
        }
    }

    /// Resolve the runtime from a configured name, or detect one
    pub fn resolve_runtime(configured: Option<&str>) -> Result<ContainerRuntime, ToolError> {
        match configured {
            Some(name) => ContainerRuntime::from_name(name).ok_or(ToolError::RuntimeNotAvailable),
            None => ContainerRuntime::detect().ok_or(ToolError::RuntimeNotAvailable),
        }
    }

    /// Add a mount
    #[must_use]
    pub fn with_mount(mut self, mount: MountConfig) -> Self {
        if !self.mounts.contains(&mount) {
            self.mounts.push(mount);
        }
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn with_workdir(mut self, workdir: PathBuf) -> Self {
        self.workdir = Some(workdir);
        self
    }

    /// Wrap `inner` so that it runs inside the container
    ///
    /// The inner command's environment becomes `-e` flags; its log file stays
    /// on the host.
    pub fn wrap(&self, inner: &ToolCommand) -> ToolCommand {
        let mut args = vec!["run".to_string(), "--rm".to_string()];

        for mount in &self.mounts {
            args.push(mount.to_arg());
        }

        if let Some(workdir) = self.workdir.as_ref().or(inner.cwd.as_ref()) {
            args.push(format!("-w={}", workdir.display()));
        }

        for (key, value) in &inner.env {
            args.push(format!("-e={key}={value}"));
        }

        args.push(self.image.clone());
        args.push(inner.program.clone());
        args.extend(inner.args.iter().cloned());

        ToolCommand {
            program: self.runtime.command().to_string(),
            args,
            env: std::collections::BTreeMap::new(),
            cwd: inner.cwd.clone(),
            log_file: inner.log_file.clone(),
        }
    }
}
