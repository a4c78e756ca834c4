//! Unified path management for studia configuration files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/studia/            # Config directory
//! ├── config.toml              # Engine and logging configuration
//! ├── sessions/                # Persisted transcripts (JsonSessionStore)
//! └── logs/                    # Application logs
//!     └── studia.log.YYYY-MM-DD
//! ```

use std::path::PathBuf;

const APP_DIR_NAME: &str = "studia";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for studia.
///
/// Paths are rooted at the platform config directory (XDG on Linux) unless
/// an explicit base is given, which tests use to stay inside a temp dir.
#[derive(Debug, Clone, Default)]
pub struct StudiaPaths {
    base_override: Option<PathBuf>,
}

impl StudiaPaths {
    /// Creates a path resolver, optionally rooted at `base`.
    pub fn new(base: Option<PathBuf>) -> Self {
        Self {
            base_override: base,
        }
    }

    /// Returns the studia configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/studia/`)
    /// - `Err(PathError::ConfigDirNotFound)`: Could not determine directory
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        if let Some(base) = &self.base_override {
            return Ok(base.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(PathError::ConfigDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    /// Returns the directory persisted transcripts live in.
    pub fn sessions_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("sessions"))
    }

    /// Returns the log directory.
    pub fn logs_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_base() {
        let paths = StudiaPaths::new(Some(PathBuf::from("/tmp/studia-test")));
        assert_eq!(
            paths.config_file().unwrap(),
            PathBuf::from("/tmp/studia-test/config.toml")
        );
        assert_eq!(
            paths.sessions_dir().unwrap(),
            PathBuf::from("/tmp/studia-test/sessions")
        );
        assert_eq!(
            paths.logs_dir().unwrap(),
            PathBuf::from("/tmp/studia-test/logs")
        );
    }
}
