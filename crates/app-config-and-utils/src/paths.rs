//! File system paths for the scaffold.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the scaffold.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for scaffold runtime files (~/.scaffold)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.scaffold`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".scaffold"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.scaffold).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.scaffold/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the persisted session file path (~/.scaffold/session.json).
    pub fn session_file(&self) -> PathBuf {
        self.base_dir.join("session.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_dir() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/scaffold-test"));
        assert_eq!(paths.base_dir(), &PathBuf::from("/tmp/scaffold-test"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/tmp/scaffold-test/config.json")
        );
        assert_eq!(
            paths.session_file(),
            PathBuf::from("/tmp/scaffold-test/session.json")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("nested").join("scaffold");
        let paths = Paths::with_base_dir(base.clone());

        paths.ensure_dirs().unwrap();
        assert!(base.is_dir());
    }
}
