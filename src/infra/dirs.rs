//! Platform-specific directory management
//!
//! The dependency cache lives in the platform cache directory unless
//! overridden. Precedence, highest first:
//! - `--cache-dir` on the command line
//! - `IOCBUILD_CACHE_DIR` in the environment
//! - `cache_dir` in `iocbuild.toml` (relative to the project)
//! - `$XDG_CACHE_HOME/iocbuild` or `~/.cache/iocbuild` (Linux),
//!   `~/Library/Caches/iocbuild` (macOS)

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache directory
pub const ENV_CACHE_DIR: &str = "IOCBUILD_CACHE_DIR";

/// Application name used in directory paths
const APP_NAME: &str = "iocbuild";

/// Resolve the cache directory from the CLI flag, environment, project
/// setting and platform default, in that order
pub fn resolve_cache_dir(
    cli: Option<&Path>,
    project_dir: &Path,
    configured: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli {
        return absolutize(project_dir, path);
    }

    if let Ok(path) = env::var(ENV_CACHE_DIR) {
        if !path.is_empty() {
            return absolutize(project_dir, Path::new(&path));
        }
    }

    if let Some(path) = configured {
        return absolutize(project_dir, path);
    }

    platform_cache_dir()
}

/// Get platform-specific cache directory
pub fn platform_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join(APP_NAME))
        .unwrap_or_else(|| {
            // Fallback to home directory
            dirs::home_dir()
                .map(|h| h.join(".cache").join(APP_NAME))
                .unwrap_or_else(|| PathBuf::from(".").join(".cache").join(APP_NAME))
        })
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
