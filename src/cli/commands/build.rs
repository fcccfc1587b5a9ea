//! CLI command for `iocbuild build`
//!
//! Builds a prepared target.

use anyhow::{Context, Result};

use super::CommandContext;
use crate::cli::output::{is_json, print_detail, print_success};
use crate::core::orchestrator::{BuildReport, OrchestratorOptions};

/// Execute the build command
pub async fn execute(ctx: CommandContext, target: &str, options: OrchestratorOptions) -> Result<()> {
    let orchestrator = ctx.orchestrator(options);
    let report = orchestrator
        .build(target)
        .await
        .with_context(|| format!("Failed to build '{target}'"))?;

    if is_json() {
        let json = serde_json::json!({
            "status": "success",
            "build": report,
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        return Ok(());
    }

    print_build_report(&report);
    Ok(())
}

/// Human-readable summary of a build
pub fn print_build_report(report: &BuildReport) {
    let place = if report.containerized { " in container" } else { "" };
    print_success(&format!("Built {}{place}", report.target));
    print_detail(&format!("Command: {}", report.command));
}
