//! JSON Export functionality
//!
//! Exports the change log to JSON format with schema versioning.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{ChangeLogRecord, ChangeLogStore};
use crate::error::{LoggableError, LoggableResult};

/// Current export schema version
pub const EXPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Change-log export structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogExport {
    /// Schema version for compatibility checking
    pub schema_version: String,

    /// Export timestamp
    pub exported_at: DateTime<Utc>,

    /// Application version that created the export
    pub app_version: String,

    /// Exported records, oldest first
    pub records: Vec<ChangeLogRecord>,

    /// Export metadata
    pub metadata: ExportMetadata,
}

/// Export metadata for reference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Total number of records
    pub record_count: usize,

    /// Number of soft-deleted records included
    pub deleted_count: usize,

    /// Record count per object type
    pub by_object_type: BTreeMap<String, usize>,

    /// Oldest record timestamp
    pub earliest_record: Option<DateTime<Utc>>,

    /// Newest record timestamp
    pub latest_record: Option<DateTime<Utc>>,
}

impl ChangeLogExport {
    /// Build an export from a list of records
    pub fn from_records(records: Vec<ChangeLogRecord>) -> Self {
        let mut by_object_type = BTreeMap::new();
        for record in &records {
            *by_object_type.entry(record.object_type.clone()).or_insert(0) += 1;
        }

        let metadata = ExportMetadata {
            record_count: records.len(),
            deleted_count: records.iter().filter(|r| r.is_deleted()).count(),
            by_object_type,
            earliest_record: records.iter().map(|r| r.created_at).min(),
            latest_record: records.iter().map(|r| r.created_at).max(),
        };

        Self {
            schema_version: EXPORT_SCHEMA_VERSION.to_string(),
            exported_at: Utc::now(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            records,
            metadata,
        }
    }

    /// Export every record of a store
    pub fn from_store(store: &dyn ChangeLogStore, include_deleted: bool) -> LoggableResult<Self> {
        let records = store
            .read_all()?
            .into_iter()
            .filter(|r| include_deleted || !r.is_deleted())
            .collect();

        Ok(Self::from_records(records))
    }
}

/// Export the change log to JSON
pub fn export_changelog_json<W: Write>(
    store: &dyn ChangeLogStore,
    writer: &mut W,
    include_deleted: bool,
    pretty: bool,
) -> LoggableResult<()> {
    let export = ChangeLogExport::from_store(store, include_deleted)?;

    if pretty {
        serde_json::to_writer_pretty(writer, &export)
    } else {
        serde_json::to_writer(writer, &export)
    }
    .map_err(|e| LoggableError::Export(e.to_string()))?;

    Ok(())
}

/// Read back a JSON export
pub fn import_from_json(json_str: &str) -> LoggableResult<ChangeLogExport> {
    let export: ChangeLogExport =
        serde_json::from_str(json_str).map_err(|e| LoggableError::Export(e.to_string()))?;

    if export.schema_version != EXPORT_SCHEMA_VERSION {
        return Err(LoggableError::Export(format!(
            "Schema version mismatch: expected {}, got {}",
            EXPORT_SCHEMA_VERSION, export.schema_version
        )));
    }

    Ok(export)
}
