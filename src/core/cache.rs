//! Dependency cache management
//!
//! Layout of the cache directory:
//!
//! ```text
//! <cache>/
//!   modules/<name>-<tag>/     fetched module checkouts
//!   modules/RELEASE.local     VAR=<cache path> for every dependency
//!   sets/<target>.set         settings handed to the preparation tool
//!   base/<tag> -> modules/epics-base-<tag>
//!   RELEASE_SITE
//!   stamps/<target>.stamp     settings of the last successful prepare
//!   logs/<target>-<stage>.log
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::version::VersionInfo;
use crate::error::FilesystemError;
use crate::infra::filesystem;

/// Cache information
#[derive(Debug, Serialize)]
pub struct CacheInfo {
    /// Cache directory path
    pub path: PathBuf,
    /// Total size in bytes
    pub size_bytes: u64,
    /// Number of cached modules
    pub module_count: usize,
    /// Whether cache exists
    pub exists: bool,
}

impl CacheInfo {
    /// Format size for display
    pub fn format_size(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// Human-readable byte count
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        "0 bytes".to_string()
    } else if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Paths inside the dependency cache
#[derive(Debug, Clone)]
pub struct CacheDirectory {
    root: PathBuf,
}

impl CacheDirectory {
    /// Cache rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding module checkouts (`CACHEDIR`)
    pub fn modules_dir(&self) -> PathBuf {
        self.root.join("modules")
    }

    /// Checkout location of `version`
    pub fn module_path(&self, version: &VersionInfo) -> PathBuf {
        self.modules_dir().join(version.cache_dir_name())
    }

    /// Whether `version` has been fetched
    ///
    /// An empty directory left by an interrupted fetch does not count.
    pub fn has_module(&self, version: &VersionInfo) -> bool {
        std::fs::read_dir(self.module_path(version))
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Directory holding settings files (`SETUP_PATH`)
    pub fn sets_dir(&self) -> PathBuf {
        self.root.join("sets")
    }

    /// Settings file for `target`
    pub fn set_file(&self, target: &str) -> PathBuf {
        self.sets_dir().join(format!("{target}.set"))
    }

    /// Link from the site layout to the cached framework
    pub fn base_link(&self, tag: &str) -> PathBuf {
        self.root.join("base").join(tag)
    }

    /// Site description read by module builds
    pub fn release_site(&self) -> PathBuf {
        self.root.join("RELEASE_SITE")
    }

    /// `VAR=<path>` for every dependency
    pub fn release_local(&self) -> PathBuf {
        self.modules_dir().join("RELEASE.local")
    }

    /// Stamp recording the last successful prepare of `target`
    pub fn stamp(&self, target: &str) -> PathBuf {
        self.root.join("stamps").join(format!("{target}.stamp"))
    }

    /// Log of one tool run
    pub fn log_file(&self, target: &str, stage: &str) -> PathBuf {
        self.root.join("logs").join(format!("{target}-{stage}.log"))
    }

    /// Create the directories the tools expect
    pub fn ensure_layout(&self) -> Result<(), FilesystemError> {
        filesystem::create_dir_all(&self.modules_dir())?;
        filesystem::create_dir_all(&self.sets_dir())?;
        filesystem::create_dir_all(&self.root.join("base"))
    }

    /// Settings recorded by the last successful prepare of `target`
    pub fn read_stamp(&self, target: &str) -> Option<String> {
        std::fs::read_to_string(self.stamp(target)).ok()
    }

    /// Record a successful prepare of `target`
    pub fn write_stamp(&self, target: &str, settings: &str) -> Result<(), FilesystemError> {
        filesystem::write_file(&self.stamp(target), settings)
    }

    /// Size and content summary
    pub fn info(&self) -> CacheInfo {
        let exists = self.root.exists();
        let module_count = std::fs::read_dir(self.modules_dir())
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
                    .count()
            })
            .unwrap_or(0);

        CacheInfo {
            path: self.root.clone(),
            size_bytes: calculate_dir_size(&self.root),
            module_count,
            exists,
        }
    }

    /// Remove the whole cache, returning the bytes freed
    pub fn clean(&self) -> Result<u64, FilesystemError> {
        if !self.root.exists() {
            return Ok(0);
        }
        let size_before = calculate_dir_size(&self.root);
        filesystem::remove_dir_all(&self.root)?;
        Ok(size_before)
    }
}

/// Calculate directory size recursively
fn calculate_dir_size(path: &Path) -> u64 {
    if !path.exists() {
        return 0;
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
