//! YAML Export functionality
//!
//! Exports the change log to YAML format for human review.

use std::io::Write;

use crate::audit::ChangeLogStore;
use crate::error::{LoggableError, LoggableResult};
use crate::export::json::ChangeLogExport;

/// Export the change log to YAML format
pub fn export_changelog_yaml<W: Write>(
    store: &dyn ChangeLogStore,
    writer: &mut W,
    include_deleted: bool,
) -> LoggableResult<()> {
    let export = ChangeLogExport::from_store(store, include_deleted)?;

    // Header comment
    writeln!(writer, "# Loggable Change Log Export")
        .map_err(|e| LoggableError::Export(e.to_string()))?;
    writeln!(writer, "# Generated: {}", export.exported_at)
        .map_err(|e| LoggableError::Export(e.to_string()))?;
    writeln!(writer, "# App Version: {}", export.app_version)
        .map_err(|e| LoggableError::Export(e.to_string()))?;
    writeln!(writer, "# Records: {}", export.metadata.record_count)
        .map_err(|e| LoggableError::Export(e.to_string()))?;
    writeln!(writer).map_err(|e| LoggableError::Export(e.to_string()))?;

    serde_yaml::to_writer(writer, &export).map_err(|e| LoggableError::Export(e.to_string()))?;

    Ok(())
}

/// Read back a YAML export
pub fn import_from_yaml(yaml_str: &str) -> LoggableResult<ChangeLogExport> {
    serde_yaml::from_str(yaml_str).map_err(|e| LoggableError::Export(e.to_string()))
}
