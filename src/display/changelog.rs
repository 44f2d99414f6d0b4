//! Change-log record display formatting
//!
//! Formats records for terminal output in table and detail views.

use serde_json::Value;

use crate::audit::ChangeLogRecord;

const ID_WIDTH: usize = 8;

/// Format a list of records as a table
pub fn format_record_list(records: &[ChangeLogRecord]) -> String {
    if records.is_empty() {
        return "No change-log records found.".to_string();
    }

    // Calculate column widths
    let type_width = records
        .iter()
        .map(|r| r.object_type.len())
        .max()
        .unwrap_or(4)
        .max(4);

    let object_width = records
        .iter()
        .map(|r| r.object_id.len())
        .max()
        .unwrap_or(6)
        .max(6);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<id_width$}  {:<19}  {:<6}  {:<type_width$}  {:<object_width$}  {}\n",
        "ID",
        "Time (UTC)",
        "Action",
        "Type",
        "Object",
        "Changes",
        id_width = ID_WIDTH,
        type_width = type_width,
        object_width = object_width,
    ));

    output.push_str(&format!(
        "{:-<id_width$}  {:-<19}  {:-<6}  {:-<type_width$}  {:-<object_width$}  {:-<10}\n",
        "",
        "",
        "",
        "",
        "",
        "",
        id_width = ID_WIDTH,
        type_width = type_width,
        object_width = object_width,
    ));

    for record in records {
        let mut changes = match record.diff() {
            Ok(Some(diff)) if diff.is_empty() => "(none)".to_string(),
            Ok(Some(diff)) => diff.summary(),
            Ok(None) => String::new(),
            Err(_) => "(unreadable)".to_string(),
        };
        if record.is_deleted() {
            changes.push_str(" [deleted]");
        }

        output.push_str(&format!(
            "{:<id_width$}  {:<19}  {:<6}  {:<type_width$}  {:<object_width$}  {}\n",
            short_id(record),
            record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.action.as_str(),
            record.object_type,
            record.object_id,
            changes.trim(),
            id_width = ID_WIDTH,
            type_width = type_width,
            object_width = object_width,
        ));
    }

    output.push_str(&format!("\n{} record(s)\n", records.len()));
    output
}

/// Format a single record's details
pub fn format_record_details(record: &ChangeLogRecord) -> String {
    let mut output = String::new();

    output.push_str(&format!("Record: {}\n", record.id));
    output.push_str(&format!("  Action:      {}\n", record.action));
    output.push_str(&format!("  Object type: {}\n", record.object_type));
    output.push_str(&format!("  Object ID:   {}\n", record.object_id));
    output.push_str(&format!(
        "  Created:     {}\n",
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(deleted_at) = record.deleted_at {
        output.push_str(&format!(
            "  Deleted:     {}\n",
            deleted_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
    }

    output.push_str("\nObject:\n");
    output.push_str(&indent(&pretty(&record.raw_object)));

    match record.diff() {
        Ok(Some(diff)) if diff.is_empty() => output.push_str("\nDiff: no loggable field changed\n"),
        Ok(Some(diff)) => {
            output.push_str("\nDiff:\n");
            for field in diff.fields() {
                if let Some(value) = diff.get(field) {
                    output.push_str(&format!("  {} -> {}\n", field, value));
                }
            }
        }
        Ok(None) => output.push_str("\nDiff: none\n"),
        Err(_) => output.push_str(&format!("\nDiff (raw): {}\n", record.raw_diff)),
    }

    if record.raw_meta != crate::audit::NO_VALUE {
        output.push_str("\nMeta:\n");
        output.push_str(&indent(&pretty(&record.raw_meta)));
    }

    output
}

fn short_id(record: &ChangeLogRecord) -> String {
    record.id.to_string().chars().take(ID_WIDTH).collect()
}

/// Pretty-print stored JSON, falling back to the raw text
fn pretty(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| raw.to_string())
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("  {}\n", line)).collect()
}
