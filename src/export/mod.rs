//! Export module
//!
//! Exports the change log in multiple formats:
//! - JSON: machine-readable, with schema version and metadata
//! - YAML: human-readable, same structure as JSON
//! - CSV: one row per record (spreadsheet-compatible)

pub mod csv;
pub mod json;
pub mod yaml;

pub use self::csv::export_changelog_csv;
pub use json::{export_changelog_json, ChangeLogExport, EXPORT_SCHEMA_VERSION};
pub use yaml::export_changelog_yaml;
