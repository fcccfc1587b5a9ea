//! CLI command for `iocbuild run`
//!
//! Prepares a target, then builds it. A failed prepare never starts the build.

use anyhow::{Context, Result};

use super::build::print_build_report;
use super::prepare::print_prepare_report;
use super::CommandContext;
use crate::cli::output::is_json;
use crate::core::orchestrator::OrchestratorOptions;

/// Execute the run command
pub async fn execute(ctx: CommandContext, target: &str, options: OrchestratorOptions) -> Result<()> {
    let orchestrator = ctx.orchestrator(options);
    let report = orchestrator
        .run(target)
        .await
        .with_context(|| format!("Failed to run '{target}'"))?;

    if is_json() {
        let json = serde_json::json!({
            "status": "success",
            "prepare": report.prepare,
            "build": report.build,
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        return Ok(());
    }

    print_prepare_report(&report.prepare);
    print_build_report(&report.build);
    Ok(())
}
