//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod cache;
pub mod deps;
pub mod doctor;
pub mod prepare;
pub mod run;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::output::is_json;
use crate::cli::ProjectArgs;
use crate::core::cache::CacheDirectory;
use crate::core::orchestrator::{BuildOrchestrator, OrchestratorOptions};
use crate::core::project::Project;
use crate::error::IocbuildError;
use crate::infra::dirs::resolve_cache_dir;
use crate::infra::process::SystemRunner;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the target's dependencies into the cache
    Prepare {
        /// Target name
        target: String,

        /// Run the preparation tool even if the cache is warm
        #[arg(short, long)]
        force: bool,
    },

    /// Build the target against the prepared cache
    Build {
        /// Target name
        target: String,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Prepare, then build
    Run {
        /// Target name
        target: String,

        /// Run the preparation tool even if the cache is warm
        #[arg(short, long)]
        force: bool,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Show the target's dependencies without running any tool
    Deps {
        /// Target name
        target: String,
    },

    /// Manage the dependency cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Check installed tools
    Doctor,
}

/// Build step options
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Build inside a container
    #[arg(long)]
    pub container: bool,

    /// Container image
    #[arg(long, value_name = "IMG")]
    pub image: Option<String>,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache information
    Info,

    /// Remove the cache
    Clean,
}

impl BuildArgs {
    fn into_options(self, force: bool) -> OrchestratorOptions {
        OrchestratorOptions {
            force,
            jobs: self.jobs,
            container: self.container.then_some(true),
            image: self.image,
        }
    }
}

/// Project and cache a command works on
pub struct CommandContext {
    /// Loaded project
    pub project: Project,
    /// Resolved cache
    pub cache: CacheDirectory,
}

impl CommandContext {
    /// Load the project from the current directory
    pub fn load(args: &ProjectArgs) -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to read current directory")?;
        let project = Project::load(&current_dir, args.config.as_deref())
            .map_err(IocbuildError::from)?;
        let cache_root = resolve_cache_dir(
            args.cache_dir.as_deref(),
            &project.root,
            project.config.project.cache_dir.as_deref(),
        );
        tracing::debug!("Using cache {}", cache_root.display());

        Ok(Self {
            project,
            cache: CacheDirectory::new(cache_root),
        })
    }

    /// Orchestrator running the real tools
    pub fn orchestrator(self, options: OrchestratorOptions) -> BuildOrchestrator<SystemRunner> {
        let runner = SystemRunner::new()
            .with_stdout_to_stderr(is_json())
            .with_log_groups(std::env::var_os("GITHUB_ACTIONS").is_some_and(|v| !v.is_empty()));
        BuildOrchestrator::new(self.project, self.cache, runner).with_options(options)
    }
}

impl Commands {
    /// Execute the command
    pub async fn run(self, args: &ProjectArgs) -> Result<()> {
        match self {
            Self::Prepare { target, force } => {
                let ctx = CommandContext::load(args)?;
                let options = OrchestratorOptions {
                    force,
                    ..OrchestratorOptions::default()
                };
                prepare::execute(ctx, &target, options).await
            }
            Self::Build { target, build: build_args } => {
                let ctx = CommandContext::load(args)?;
                build::execute(ctx, &target, build_args.into_options(false)).await
            }
            Self::Run {
                target,
                force,
                build: build_args,
            } => {
                let ctx = CommandContext::load(args)?;
                run::execute(ctx, &target, build_args.into_options(force)).await
            }
            Self::Deps { target } => {
                let ctx = CommandContext::load(args)?;
                deps::execute(ctx, &target).await
            }
            Self::Cache { command } => {
                let ctx = CommandContext::load(args)?;
                match command {
                    CacheCommands::Info => cache::execute_info(&ctx.cache).await,
                    CacheCommands::Clean => cache::execute_clean(&ctx.cache).await,
                }
            }
            Self::Doctor => {
                let current_dir = std::env::current_dir()?;
                doctor::execute(&current_dir, args.config.as_deref()).await
            }
        }
    }
}
