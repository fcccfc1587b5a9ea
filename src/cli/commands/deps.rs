//! CLI command for `iocbuild deps`
//!
//! Shows what a target depends on and what is already cached. Never runs a
//! tool.

use anyhow::{Context, Result};

use super::CommandContext;
use crate::cli::output::{is_json, is_quiet, print_detail, print_info, status};
use crate::core::orchestrator::OrchestratorOptions;

/// Execute the deps command
pub async fn execute(ctx: CommandContext, target: &str) -> Result<()> {
    let orchestrator = ctx.orchestrator(OrchestratorOptions::default());
    let resolution = orchestrator
        .resolve(target)
        .with_context(|| format!("Failed to resolve dependencies of '{target}'"))?;

    if is_json() {
        println!(
            "{}",
            serde_json::to_string_pretty(&resolution).unwrap_or_default()
        );
        return Ok(());
    }

    if is_quiet() {
        return Ok(());
    }

    print_info(&format!(
        "{} ({})",
        resolution.target.name,
        resolution.target.path.display()
    ));
    println!();

    for dep in &resolution.dependencies {
        let cached = !resolution.missing.contains(&dep.variable);
        let mark = if cached { status::SUCCESS } else { status::ERROR };
        println!("  {mark} {:<20} {}", dep.variable, dep.version);
        if let Some(path) = resolution.paths.get(&dep.variable) {
            print_detail(&format!("  {}", path.display()));
        }
        if !dep.requires.is_empty() {
            let requires: Vec<&str> = dep.requires.iter().map(String::as_str).collect();
            print_detail(&format!("  requires {}", requires.join(", ")));
        }
    }

    println!();
    print_detail(&format!("Build order: {}", resolution.build_order.join(" ")));
    if resolution.missing.is_empty() {
        print_detail("All dependencies are cached");
    } else {
        print_detail(&format!(
            "Not cached: {} (run 'iocbuild prepare {target}')",
            resolution.missing.join(", ")
        ));
    }

    Ok(())
}
