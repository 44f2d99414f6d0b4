//! CSV Export functionality
//!
//! Exports change-log records to CSV, one row per record. The object,
//! diff and metadata columns hold the stored JSON text.

use std::io::Write;

use crate::audit::ChangeLogStore;
use crate::error::{LoggableError, LoggableResult};

const HEADER: [&str; 9] = [
    "ID",
    "Created At",
    "Deleted At",
    "Action",
    "Object Type",
    "Object ID",
    "Object",
    "Diff",
    "Meta",
];

/// Export the change log to CSV
pub fn export_changelog_csv<W: Write>(
    store: &dyn ChangeLogStore,
    writer: &mut W,
    include_deleted: bool,
) -> LoggableResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(HEADER)
        .map_err(|e| LoggableError::Export(e.to_string()))?;

    for record in store.read_all()? {
        if record.is_deleted() && !include_deleted {
            continue;
        }

        let deleted_at = record
            .deleted_at
            .map(|d| d.to_rfc3339())
            .unwrap_or_default();

        csv_writer
            .write_record([
                record.id.to_string(),
                record.created_at.to_rfc3339(),
                deleted_at,
                record.action.to_string(),
                record.object_type,
                record.object_id,
                record.raw_object,
                record.raw_diff,
                record.raw_meta,
            ])
            .map_err(|e| LoggableError::Export(e.to_string()))?;
    }

    csv_writer
        .flush()
        .map_err(|e| LoggableError::Export(e.to_string()))?;

    Ok(())
}
