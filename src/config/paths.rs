//! Path management for loggable
//!
//! Provides XDG-compliant path resolution for settings, host tables and the
//! change log.
//!
//! ## Path Resolution Order
//!
//! 1. `LOGGABLE_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/loggable` or `~/.config/loggable`
//! 3. Windows: `%APPDATA%\loggable`

use std::path::PathBuf;

use crate::error::LoggableError;

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "LOGGABLE_DATA_DIR";

/// Manages all paths used by loggable
#[derive(Debug, Clone)]
pub struct LoggablePaths {
    /// Base directory for all loggable data
    base_dir: PathBuf,
}

impl LoggablePaths {
    /// Create a new LoggablePaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, LoggableError> {
        let base_dir = if let Ok(custom) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create LoggablePaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the data directory holding host tables
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the path to the change log
    pub fn changelog_file(&self) -> PathBuf {
        self.base_dir.join("changelog.jsonl")
    }

    /// Get the path of a host table file
    pub fn table_file(&self, table: &str) -> PathBuf {
        self.data_dir().join(format!("{}.json", table))
    }

    /// Ensure the base and data directories exist
    pub fn ensure_directories(&self) -> Result<(), LoggableError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| LoggableError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| LoggableError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }

    /// Check if loggable has been initialized (config file exists)
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, LoggableError> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) => PathBuf::from(xdg),
        Err(_) => {
            let home = std::env::var("HOME").map_err(|_| {
                LoggableError::Config("HOME environment variable not set".into())
            })?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("loggable"))
}

#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, LoggableError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| LoggableError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("loggable"))
}
