//! Custom error types for loggable
//!
//! This module defines the error hierarchy for the plugin and its reference
//! host using thiserror for ergonomic error definitions.

use thiserror::Error;

/// The main error type for loggable operations
#[derive(Error, Debug)]
pub enum LoggableError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON parsing errors (reading stored data back)
    #[error("JSON error: {0}")]
    Json(String),

    /// An object, diff or metadata value could not be converted to its stored form
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A change-log record identifier could not be minted
    #[error("Identity generation error: {0}")]
    IdGeneration(String),

    /// The change-log write was rejected
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// Storage errors (host tables, lock poisoning)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),
}

impl LoggableError {
    /// Create a "not found" error for change-log records
    pub fn record_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Change log record",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for host rows
    pub fn row_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Row",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error belongs to change-log record assembly or persistence
    pub fn is_change_log_failure(&self) -> bool {
        matches!(
            self,
            Self::Serialization(_) | Self::IdGeneration(_) | Self::Persistence(_)
        )
    }
}

impl From<std::io::Error> for LoggableError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LoggableError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for loggable operations
pub type LoggableResult<T> = Result<T, LoggableError>;
