//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use commands::Commands;

/// iocbuild - EPICS IOC build orchestrator
///
/// Fetches the modules an IOC depends on into a shared cache, then builds it.
#[derive(Parser, Debug)]
#[command(name = "iocbuild")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Project file (default: ./iocbuild.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Dependency cache directory
    #[arg(long, global = true, value_name = "DIR", env = "IOCBUILD_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where to find the project and its cache
#[derive(Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Explicit project file
    pub config: Option<PathBuf>,
    /// Explicit cache directory
    pub cache_dir: Option<PathBuf>,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let args = ProjectArgs {
            config: self.config,
            cache_dir: self.cache_dir,
        };
        if let Some(cmd) = self.command {
            cmd.run(&args).await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}
