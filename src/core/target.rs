//! Build targets

use serde::Serialize;
use std::path::PathBuf;

/// An IOC source tree that can be prepared and built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    /// Name used on the command line and in cache file names
    pub name: String,
    /// Source directory (the `TOP` of the IOC)
    pub path: PathBuf,
}

impl Target {
    /// Create a target
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// `configure/RELEASE`, the root of dependency discovery
    pub fn release_path(&self) -> PathBuf {
        self.path.join("configure").join("RELEASE")
    }

    /// `configure/RELEASE.local`, read after `RELEASE` unless already included
    pub fn release_local_path(&self) -> PathBuf {
        self.path.join("configure").join("RELEASE.local")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_paths() {
        let target = Target::new("ioc-a", "/work/ioc-a");
        assert_eq!(target.release_path(), PathBuf::from("/work/ioc-a/configure/RELEASE"));
        assert_eq!(
            target.release_local_path(),
            PathBuf::from("/work/ioc-a/configure/RELEASE.local")
        );
    }
}
