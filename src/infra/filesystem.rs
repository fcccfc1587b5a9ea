//! Filesystem operations
//!
//! Thin wrappers that attach the offending path to every failure.

use std::path::Path;

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a directory and all its contents
pub fn remove_dir_all(path: &Path) -> Result<(), FilesystemError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| FilesystemError::RemoveDir {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Write content to a file, creating parent directories
pub fn write_file(path: &Path, content: &str) -> Result<(), FilesystemError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Point `link` at `target`, replacing an existing link
#[cfg(unix)]
pub fn replace_symlink(target: &Path, link: &Path) -> Result<(), FilesystemError> {
    let to_err = |e: std::io::Error| FilesystemError::Link {
        link: link.to_path_buf(),
        target: target.to_path_buf(),
        error: e.to_string(),
    };

    if link.symlink_metadata().is_ok_and(|m| m.file_type().is_symlink()) {
        std::fs::remove_file(link).map_err(to_err)?;
    }
    if let Some(parent) = link.parent() {
        create_dir_all(parent)?;
    }
    std::os::unix::fs::symlink(target, link).map_err(to_err)
}

/// Symlinks are a Unix convenience; elsewhere the link is skipped
#[cfg(not(unix))]
pub fn replace_symlink(target: &Path, link: &Path) -> Result<(), FilesystemError> {
    tracing::debug!(
        "Skipping link {} -> {} on this platform",
        link.display(),
        target.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/c.txt");
        write_file(&path, "hello").unwrap();
        assert_eq!(read_file(&path).unwrap(), "hello");
    }

    #[test]
    fn test_read_missing_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing");
        let err = read_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[cfg(unix)]
    #[test]
    fn test_replace_symlink_twice() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        std::fs::create_dir(&first).unwrap();
        std::fs::create_dir(&second).unwrap();
        let link = temp.path().join("links/current");

        replace_symlink(&first, &link).unwrap();
        replace_symlink(&second, &link).unwrap();

        assert_eq!(std::fs::read_link(&link).unwrap(), second);
    }
}
