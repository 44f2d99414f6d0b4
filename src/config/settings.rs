//! User settings for loggable
//!
//! Controls how the plugin records updates: whether diffs are computed,
//! whether unchanged updates are skipped, and how create/delete failures
//! are reported.

use serde::{Deserialize, Serialize};

use super::paths::LoggablePaths;
use crate::error::LoggableError;

/// Persisted plugin settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Compute and store a field diff on update records
    #[serde(default)]
    pub compute_diff: bool,

    /// Skip update records when the watched fields did not change
    #[serde(default)]
    pub lazy_update: bool,

    /// Fields watched by `lazy_update` (empty = every loggable field)
    #[serde(default)]
    pub lazy_update_fields: Vec<String>,

    /// Surface create/delete change-log failures to the caller instead of
    /// only logging them
    #[serde(default)]
    pub propagate_create_delete_errors: bool,
}

fn default_schema_version() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            compute_diff: false,
            lazy_update: false,
            lazy_update_fields: Vec::new(),
            propagate_create_delete_errors: false,
        }
    }
}

impl Settings {
    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(paths: &LoggablePaths) -> Result<Self, LoggableError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
                LoggableError::Io(format!("Failed to read settings file: {}", e))
            })?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                LoggableError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &LoggablePaths) -> Result<(), LoggableError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            LoggableError::Config(format!("Failed to serialize settings: {}", e))
        })?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| LoggableError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}
