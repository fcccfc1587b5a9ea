//! Build orchestration logic
//!
//! Drives the two external tools for one target:
//!
//! 1. `prepare` discovers dependencies from RELEASE files and runs the
//!    preparation tool until every dependency is in the cache.
//! 2. `build` runs the build tool against the prepared cache.
//!
//! `run` is `prepare` followed by `build`; a failed prepare never reaches the
//! build tool. Tool exit codes travel back in the returned errors.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::defaults::BASE_VARIABLE;
use crate::core::build_env::{BuildEnvironment, EnvSnapshot};
use crate::core::cache::CacheDirectory;
use crate::core::dependency::{discover, Dependency, DependencySet, DiscoveryContext};
use crate::core::project::Project;
use crate::core::settings;
use crate::core::target::Target;
use crate::core::version::{ModulePathMatcher, VersionInfo};
use crate::error::{BuildError, IocbuildError, ResolveError};
use crate::infra::container::{ContainerConfig, MountConfig};
use crate::infra::filesystem;
use crate::infra::process::{Placeholders, ToolCommand, ToolOutcome, ToolRunner};

/// Per-invocation overrides from the command line
#[derive(Debug, Clone, Default)]
pub struct OrchestratorOptions {
    /// Run the preparation tool even when the cache is warm
    pub force: bool,
    /// Parallel jobs, overriding configuration
    pub jobs: Option<usize>,
    /// Build in a container, overriding configuration
    pub container: Option<bool>,
    /// Container image, overriding configuration
    pub image: Option<String>,
}

/// Dependencies of a target as currently known
#[derive(Debug, Serialize)]
pub struct Resolution {
    /// The target
    pub target: Target,
    /// Every dependency, the framework included
    pub dependencies: Vec<Dependency>,
    /// Cache path of every dependency, by variable
    pub paths: BTreeMap<String, PathBuf>,
    /// Module build order, the framework excluded
    pub build_order: Vec<String>,
    /// Dependencies not yet in the cache
    pub missing: Vec<String>,
}

/// Outcome of a successful prepare
#[derive(Debug, Serialize)]
pub struct PrepareReport {
    /// Target name
    pub target: String,
    /// Dependencies in build order, the framework first
    pub build_order: Vec<String>,
    /// Times the preparation tool ran
    pub tool_runs: usize,
    /// Settings file handed to the tool
    pub set_file: PathBuf,
    /// Module RELEASE files pointed at the cache
    pub patched: Vec<PathBuf>,
}

/// Outcome of a successful build
#[derive(Debug, Serialize)]
pub struct BuildReport {
    /// Target name
    pub target: String,
    /// Command line that ran
    pub command: String,
    /// Whether it ran in a container
    pub containerized: bool,
}

/// Outcome of a successful prepare and build
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Prepare step
    pub prepare: PrepareReport,
    /// Build step
    pub build: BuildReport,
}

/// Sequences the preparation and build tools for a project
pub struct BuildOrchestrator<R> {
    project: Project,
    cache: CacheDirectory,
    runner: R,
    options: OrchestratorOptions,
    snapshot: EnvSnapshot,
}

impl<R: ToolRunner> BuildOrchestrator<R> {
    /// Create an orchestrator using the current process environment
    pub fn new(project: Project, cache: CacheDirectory, runner: R) -> Self {
        Self {
            project,
            cache,
            runner,
            options: OrchestratorOptions::default(),
            snapshot: EnvSnapshot::capture(),
        }
    }

    /// Apply command-line overrides
    #[must_use]
    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve the environment from `snapshot` instead of the process
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: EnvSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Cache in use
    pub fn cache(&self) -> &CacheDirectory {
        &self.cache
    }

    /// Tool runner in use
    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn discovery_context(&self) -> DiscoveryContext {
        let config = &self.project.config;
        DiscoveryContext {
            matcher: ModulePathMatcher::new(&config.module_roots()),
            introspection: config.introspection.to_variables(),
            base_tag: config.base_tag().to_string(),
        }
    }

    /// Discover the dependencies of `name` without running any tool
    pub fn resolve(&self, name: &str) -> Result<Resolution, IocbuildError> {
        let target = self.project.target(name)?;
        let deps = discover(&target, &self.discovery_context(), &self.cache)?;

        Ok(Resolution {
            paths: settings::dependency_paths(&deps, &self.cache),
            build_order: deps.build_order(),
            missing: deps.missing(&self.cache),
            dependencies: deps.iter().cloned().collect(),
            target,
        })
    }

    fn environment(&self, target: &Target) -> Result<BuildEnvironment, IocbuildError> {
        let mut env = BuildEnvironment::resolve(
            &self.project.config,
            &self.cache,
            &target.name,
            &self.snapshot,
        );
        if let Some(jobs) = self.options.jobs {
            env = env.with_jobs(jobs);
        }
        env.validate()?;
        Ok(env)
    }

    fn placeholders(&self, target: &Target, env: &BuildEnvironment) -> Placeholders {
        Placeholders::new()
            .with_path("project", &self.project.root)
            .with("target", target.name.as_str())
            .with_path("target_path", &target.path)
            .with_path("cache", self.cache.root())
            .with("jobs", env.jobs.to_string())
    }

    fn set_text(&self, deps: &DependencySet) -> String {
        settings::render_set_file(deps, &deps.build_order(), self.project.config.repo_owner())
    }

    /// Write `RELEASE_SITE` and link the site layout to the cached framework
    fn write_site_files(&self) -> Result<(), IocbuildError> {
        let tag = self.project.config.base_tag();
        self.cache.ensure_layout()?;
        filesystem::write_file(
            &self.cache.release_site(),
            &settings::render_release_site(&self.cache, tag),
        )?;
        filesystem::replace_symlink(
            &self.cache.module_path(&VersionInfo::base(tag)),
            &self.cache.base_link(tag),
        )?;
        Ok(())
    }

    /// Fetch every dependency of `name` into the cache
    ///
    /// Each round rediscovers dependencies, since fetched modules can name
    /// further ones. The tool does not run when nothing is missing, unless
    /// `force` is set.
    pub async fn prepare(&self, name: &str) -> Result<PrepareReport, IocbuildError> {
        let target = self.project.target(name)?;
        let env = self.environment(&target)?;
        let ctx = self.discovery_context();
        let max_rounds = self.project.config.max_rounds();

        self.write_site_files()?;

        let mut previous_missing: Option<Vec<String>> = None;
        let mut tool_runs = 0;

        for round in 0..=max_rounds {
            let deps = discover(&target, &ctx, &self.cache)?;
            let set_text = self.set_text(&deps);
            let set_file = self.cache.set_file(&target.name);
            filesystem::write_file(&set_file, &set_text)?;
            filesystem::write_file(
                &self.cache.release_local(),
                &settings::render_release_local(&deps, &self.cache),
            )?;

            let missing = deps.missing(&self.cache);
            let forced = self.options.force && round == 0;

            if missing.is_empty() && !forced {
                let patch_vars = settings::patch_variables(&deps, &self.cache);
                let patched = settings::patch_module_release_files(&deps, &self.cache, &patch_vars);
                self.cache.write_stamp(&target.name, &set_text)?;

                tracing::info!(
                    "Prepared {} ({} dependencies, {tool_runs} tool runs)",
                    target.name,
                    deps.len()
                );
                return Ok(PrepareReport {
                    target: target.name,
                    build_order: std::iter::once(BASE_VARIABLE.to_string())
                        .chain(deps.build_order())
                        .collect(),
                    tool_runs,
                    set_file,
                    patched,
                });
            }

            if !missing.is_empty()
                && (round == max_rounds || previous_missing.as_ref() == Some(&missing))
            {
                return Err(ResolveError::Unresolved { missing }.into());
            }

            tracing::info!("Fetching: {}", missing.join(", "));
            let command = ToolCommand::from_template(
                &self.project.config.prepare_command(),
                &self.placeholders(&target, &env),
                "prepare",
            )?
            .envs(env.to_env_map())
            .current_dir(&self.project.root)
            .log_to(self.cache.log_file(&target.name, "prepare"));

            let outcome = self.runner.run(&command).await?;
            tool_runs += 1;
            if !outcome.is_success() {
                self.report_failure("prepare", &target, &outcome);
                return Err(ResolveError::PrepareFailed {
                    target: target.name,
                    code: outcome.code,
                }
                .into());
            }

            previous_missing = Some(missing);
        }

        Err(ResolveError::Unresolved {
            missing: Vec::new(),
        }
        .into())
    }

    /// Build `name` against its prepared cache
    pub async fn build(&self, name: &str) -> Result<BuildReport, IocbuildError> {
        let target = self.project.target(name)?;
        let deps = discover(&target, &self.discovery_context(), &self.cache)?;

        let not_prepared = |reason: &str| BuildError::NotPrepared {
            target: target.name.clone(),
            reason: reason.to_string(),
        };
        match self.cache.read_stamp(&target.name) {
            None => return Err(not_prepared("no successful prepare recorded").into()),
            Some(stamp) if stamp != self.set_text(&deps) => {
                return Err(not_prepared("dependencies changed since the last prepare").into());
            }
            Some(_) => {}
        }
        let missing = deps.missing(&self.cache);
        if !missing.is_empty() {
            return Err(not_prepared(&format!("missing from cache: {}", missing.join(", "))).into());
        }

        let env = self.environment(&target)?;

        let mut command = ToolCommand::from_template(
            &self.project.config.build_command(),
            &self.placeholders(&target, &env),
            "build",
        )?
        .envs(env.to_env_map())
        .current_dir(&target.path)
        .log_to(self.cache.log_file(&target.name, "build"));

        if self.project.config.release_overrides() {
            command = command.args(
                settings::dependency_paths(&deps, &self.cache)
                    .into_iter()
                    .map(|(var, path)| format!("{var}={}", path.display())),
            );
        }

        let containerized = self
            .options
            .container
            .or(self.project.config.container.enabled)
            .unwrap_or(false);
        if containerized {
            command = self.containerize(&target, &command)?;
        }

        let outcome = self.runner.run(&command).await?;
        if !outcome.is_success() {
            self.report_failure("build", &target, &outcome);
            return Err(BuildError::BuildFailed {
                target: target.name,
                code: outcome.code,
            }
            .into());
        }

        tracing::info!("Built {}", target.name);
        Ok(BuildReport {
            target: target.name,
            command: command.command_line(),
            containerized,
        })
    }

    /// Prepare, then build if preparation succeeded
    pub async fn run(&self, name: &str) -> Result<RunReport, IocbuildError> {
        let prepare = self.prepare(name).await?;
        let build = self.build(name).await?;
        Ok(RunReport { prepare, build })
    }

    fn containerize(&self, target: &Target, inner: &ToolCommand) -> Result<ToolCommand, IocbuildError> {
        let config = &self.project.config;
        let runtime = ContainerConfig::resolve_runtime(config.container.runtime.as_deref())?;
        let image = self
            .options
            .image
            .clone()
            .unwrap_or_else(|| config.container_image().to_string());

        let container = ContainerConfig::new(runtime, image)
            .with_mount(MountConfig::same_path(self.cache.root().to_path_buf()))
            .with_mount(MountConfig::same_path(target.path.clone()))
            .with_workdir(target.path.clone());

        tracing::debug!("Building in {} image {}", runtime.command(), container.image);
        Ok(container.wrap(inner))
    }

    fn report_failure(&self, stage: &str, target: &Target, outcome: &ToolOutcome) {
        tracing::error!(
            "{stage} of {} exited with {}; full output in {}",
            target.name,
            outcome.code,
            self.cache.log_file(&target.name, stage).display()
        );
        for line in &outcome.tail {
            tracing::debug!("  | {line}");
        }
    }
}
