//! CLI command for `iocbuild cache`
//!
//! Reports on and removes the dependency cache.

use anyhow::{Context, Result};

use crate::cli::output::{create_spinner, is_json, print_detail, print_info, print_success, print_warning};
use crate::core::cache::{format_size, CacheDirectory};
use crate::error::IocbuildError;

/// Execute cache info subcommand
pub async fn execute_info(cache: &CacheDirectory) -> Result<()> {
    let spinner = create_spinner("Measuring cache...");
    let info = cache.info();
    spinner.finish_and_clear();

    if is_json() {
        println!("{}", serde_json::to_string_pretty(&info).unwrap_or_default());
        return Ok(());
    }

    print_info("Cache Information");
    print_detail(&format!("Location: {}", info.path.display()));
    print_detail(&format!("Size: {}", info.format_size()));
    print_detail(&format!("Modules: {}", info.module_count));

    if !info.exists {
        print_warning("Cache directory does not exist (empty cache)");
    }

    Ok(())
}

/// Execute cache clean subcommand
pub async fn execute_clean(cache: &CacheDirectory) -> Result<()> {
    let spinner = create_spinner("Cleaning cache...");
    let result = cache.clean();
    spinner.finish_and_clear();

    let freed = result
        .map_err(IocbuildError::from)
        .with_context(|| format!("Failed to clean cache at {}", cache.root().display()))?;

    if is_json() {
        let json = serde_json::json!({
            "status": "success",
            "path": cache.root(),
            "freed_bytes": freed,
        });
        println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        return Ok(());
    }

    if freed > 0 {
        print_success(&format!("Cache cleared ({} freed)", format_size(freed)));
    } else {
        print_success("Cache was already empty");
    }
    Ok(())
}
