//! CLI command for `iocbuild prepare`
//!
//! Fetches every dependency of a target into the cache.

use anyhow::{Context, Result};

use super::CommandContext;
use crate::cli::output::{is_json, print_detail, print_success};
use crate::core::orchestrator::{OrchestratorOptions, PrepareReport};

/// Execute the prepare command
pub async fn execute(ctx: CommandContext, target: &str, options: OrchestratorOptions) -> Result<()> {
    let orchestrator = ctx.orchestrator(options);
    let report = orchestrator
        .prepare(target)
        .await
        .with_context(|| format!("Failed to prepare '{target}'"))?;

    if is_json() {
        let json = serde_json::json!({
            "status": "success",
            "prepare": report,
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        return Ok(());
    }

    print_prepare_report(&report);
    Ok(())
}

/// Human-readable summary of a prepare
pub fn print_prepare_report(report: &PrepareReport) {
    print_success(&format!(
        "Prepared {} ({} dependencies)",
        report.target,
        report.build_order.len()
    ));
    if report.tool_runs == 0 {
        print_detail("Cache already up to date");
    } else {
        print_detail(&format!("Preparation tool ran {} time(s)", report.tool_runs));
    }
    print_detail(&format!("Build order: {}", report.build_order.join(" ")));
    print_detail(&format!("Settings: {}", report.set_file.display()));
    if !report.patched.is_empty() {
        print_detail(&format!("Patched {} RELEASE file(s)", report.patched.len()));
    }
}
