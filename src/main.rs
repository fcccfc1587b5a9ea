//! iocbuild CLI - EPICS IOC build orchestrator
//!
//! Entry point for the iocbuild command-line application.

use clap::Parser;

use iocbuild::cli::output::{display_error, exit_code_for, OutputConfig};
use iocbuild::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let output_config = OutputConfig::new(cli.quiet, cli.json, cli.verbose);

    // Logs go to stderr so tool output and JSON keep stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(output_config.log_level().into()),
        )
        .init();

    output_config.apply_global();

    if let Err(e) = cli.run().await {
        display_error(&e);
        std::process::exit(exit_code_for(&e));
    }
}
