//! Loggable - change logging for stored entities
//!
//! This library records a change-log entry for every create, update and
//! delete of registered entity types. Entities are snapshotted when they
//! are loaded so that updates can be logged with a diff of the fields that
//! actually changed.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `storage`: JSON file tables with lifecycle callbacks
//! - `audit`: The change-log plugin
//! - `cli`: Command handlers of the `loggable` binary
//! - `display`: Terminal formatting of change-log records
//! - `export`: JSON, YAML and CSV export of the change log
//!
//! # Example
//!
//! ```rust,ignore
//! use loggable::config::LoggablePaths;
//! use loggable::storage::Database;
//!
//! let db = Database::open(LoggablePaths::new()?)?;
//! let plugin = loggable::audit::register(&db, Default::default())?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod storage;

pub use error::LoggableError;
