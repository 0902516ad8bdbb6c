//! Path management for exodus configuration files.
//!
//! All persisted state lives under a single per-user configuration
//! directory:
//!
//! ```text
//! ~/.config/exodus/
//! └── settings.toml    # delay + persisted selection
//! ```

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform configuration directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find configuration directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Resolves the on-disk locations exodus uses.
///
/// A base directory can be injected (tests, portable installs); otherwise
/// the platform configuration directory is used.
#[derive(Debug, Clone, Default)]
pub struct ExodusPaths {
    base_dir: Option<PathBuf>,
}

impl ExodusPaths {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    /// Returns the exodus configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: e.g. `~/.config/exodus/`
    /// - `Err(PathError::ConfigDirNotFound)`: no home/config directory
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        if let Some(base) = &self.base_dir {
            return Ok(base.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join("exodus"))
            .ok_or(PathError::ConfigDirNotFound)
    }

    /// Returns the path to the settings file.
    pub fn settings_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("settings.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_base_dir_wins() {
        let paths = ExodusPaths::new(Some(PathBuf::from("/tmp/exodus-test")));

        assert_eq!(
            paths.settings_file().unwrap(),
            PathBuf::from("/tmp/exodus-test/settings.toml")
        );
    }

    #[test]
    fn test_default_paths_end_with_app_dir() {
        let paths = ExodusPaths::default();
        if let Ok(dir) = paths.config_dir() {
            assert!(dir.ends_with("exodus"));
        }
    }
}
