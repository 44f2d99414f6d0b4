//! Change-log record data structures
//!
//! Defines the action types and the stored record format. The object,
//! diff and metadata are kept in their serialized JSON form so a record is
//! independent of the Rust type that produced it.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LoggableError, LoggableResult};

use super::diff::UpdateDiff;

/// Serialized marker stored when a record carries no diff or metadata
pub const NO_VALUE: &str = "null";

/// Lifecycle action that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Entity was created
    Create,
    /// Entity was updated
    Update,
    /// Entity was deleted
    Delete,
}

impl Action {
    /// Lowercase name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change-log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogRecord {
    /// Globally unique record id
    pub id: Uuid,

    /// When the record was written (UTC)
    pub created_at: DateTime<Utc>,

    /// Soft-deletion marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    /// Action that produced the record
    pub action: Action,

    /// Primary key of the affected object, normalized to a string
    pub object_id: String,

    /// Registered type name of the affected object
    pub object_type: String,

    /// JSON of the full object state
    pub raw_object: String,

    /// JSON of caller-supplied metadata
    pub raw_meta: String,

    /// JSON of the sparse update diff, or `"null"`
    pub raw_diff: String,
}

impl ChangeLogRecord {
    /// Whether the record has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether the record carries a diff
    pub fn has_diff(&self) -> bool {
        self.raw_diff != NO_VALUE
    }

    /// Parse the stored diff; `None` when the record has no diff
    pub fn diff(&self) -> LoggableResult<Option<UpdateDiff>> {
        serde_json::from_str(&self.raw_diff)
            .map_err(|e| LoggableError::Json(format!("Failed to parse record diff: {}", e)))
    }

    /// Deserialize the stored object into a concrete type
    pub fn object<T: DeserializeOwned>(&self) -> LoggableResult<T> {
        serde_json::from_str(&self.raw_object)
            .map_err(|e| LoggableError::Json(format!("Failed to parse record object: {}", e)))
    }

    /// Stored object as a generic JSON value
    pub fn object_value(&self) -> LoggableResult<serde_json::Value> {
        self.object()
    }

    /// Deserialize the stored metadata into a concrete type
    pub fn meta<T: DeserializeOwned>(&self) -> LoggableResult<T> {
        serde_json::from_str(&self.raw_meta)
            .map_err(|e| LoggableError::Json(format!("Failed to parse record metadata: {}", e)))
    }

    /// Format the record for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} {} {}",
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.action.as_str().to_uppercase(),
            self.object_type,
            self.object_id
        );

        if self.is_deleted() {
            output.push_str(" (deleted)");
        }

        if let Ok(Some(diff)) = self.diff() {
            if !diff.is_empty() {
                output.push_str(&format!("\n  Changes: {}", diff.summary()));
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(action: Action, raw_diff: &str) -> ChangeLogRecord {
        ChangeLogRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            deleted_at: None,
            action,
            object_id: "1".into(),
            object_type: "User".into(),
            raw_object: r#"{"id":1,"name":"a"}"#.into(),
            raw_meta: NO_VALUE.into(),
            raw_diff: raw_diff.into(),
        }
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Create.to_string(), "create");
        assert_eq!(Action::Update.to_string(), "update");
        assert_eq!(Action::Delete.to_string(), "delete");
    }

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Action::Update).unwrap(), "\"update\"");
    }

    #[test]
    fn test_no_diff_marker() {
        let rec = record(Action::Create, NO_VALUE);
        assert!(!rec.has_diff());
        assert!(rec.diff().unwrap().is_none());
    }

    #[test]
    fn test_diff_parsed() {
        let rec = record(Action::Update, r#"{"name":"b"}"#);
        let diff = rec.diff().unwrap().unwrap();
        assert_eq!(diff.get("name"), Some(&json!("b")));
        assert_eq!(diff.len(), 1);
    }

    #[test]
    fn test_typed_object_and_meta() {
        #[derive(Deserialize)]
        struct User {
            id: u32,
            name: String,
        }

        let mut rec = record(Action::Create, NO_VALUE);
        rec.raw_meta = r#"{"created_by":"admin"}"#.into();

        let user: User = rec.object().unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.name, "a");

        let meta: serde_json::Value = rec.meta().unwrap();
        assert_eq!(meta, json!({"created_by": "admin"}));
    }

    #[test]
    fn test_deleted_at_omitted_when_absent() {
        let rec = record(Action::Create, NO_VALUE);
        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("deleted_at"));

        let back: ChangeLogRecord = serde_json::from_str(&json).unwrap();
        assert!(!back.is_deleted());
    }

    #[test]
    fn test_human_readable_format() {
        let rec = record(Action::Update, r#"{"name":"b"}"#);
        let formatted = rec.format_human_readable();
        assert!(formatted.contains("UPDATE User 1"));
        assert!(formatted.contains("Changes: name: \"b\""));
    }
}
