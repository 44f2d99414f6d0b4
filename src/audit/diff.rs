//! Diff computation for update records
//!
//! Compares the new state of an entity against its cached snapshot, one
//! loggable field at a time, and keeps only the fields that changed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LoggableError, LoggableResult};

use super::schema::Schema;

/// Sparse map of changed field name to new value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateDiff(BTreeMap<String, Value>);

impl UpdateDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Changed field names in sorted order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// One-line human-readable form, e.g. `name: "b", age: 3`
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|(field, value)| format!("{}: {}", field, format_value(value)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Format a JSON value for human-readable display
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            if s.chars().count() > 50 {
                let head: String = s.chars().take(47).collect();
                format!("\"{}...\"", head)
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}

/// Compute the diff between a snapshot and the new state
///
/// Only fields declared on the schema are compared. Returns an empty diff
/// when nothing changed.
pub fn compute_update_diff<E>(schema: &Schema<E>, old: &E, new: &E) -> LoggableResult<UpdateDiff> {
    let mut diff = UpdateDiff::new();

    for field in schema.fields() {
        if field.changed(old, new) {
            diff.insert(field.name(), field.value(new)?);
        }
    }

    Ok(diff)
}

/// Resolve the fields watched by the lazy-update check
///
/// An empty list watches every loggable field.
fn watched_fields<'a, E>(schema: &'a Schema<E>, lazy_fields: &'a [String]) -> Vec<&'a str> {
    if lazy_fields.is_empty() {
        schema.fields().iter().map(|f| f.name()).collect()
    } else {
        lazy_fields.iter().map(String::as_str).collect()
    }
}

/// Whether two states are equal on every watched field
///
/// A watched name that is not a loggable field never matches.
pub fn is_equal<E>(schema: &Schema<E>, old: &E, new: &E, lazy_fields: &[String]) -> bool {
    watched_fields(schema, lazy_fields)
        .into_iter()
        .all(|name| match schema.find_field(name) {
            Some(field) => !field.changed(old, new),
            None => false,
        })
}

/// Whether the new state matches a previously stored object on every watched field
///
/// Used when no snapshot is cached: the stored object is the JSON of the
/// most recent change-log record. A watched field is looked up under its
/// schema name when the new state's JSON holds the field's value there.
/// Otherwise its serialized key is unknown, and the whole new state must
/// match the stored object on every key they share.
pub fn is_equal_to_stored<E: Serialize>(
    schema: &Schema<E>,
    stored: &Value,
    new: &E,
    lazy_fields: &[String],
) -> LoggableResult<bool> {
    let current = serde_json::to_value(new).map_err(|e| {
        LoggableError::Serialization(format!("Failed to serialize {}: {}", schema.name(), e))
    })?;
    let mut unresolved = false;

    for name in watched_fields(schema, lazy_fields) {
        let Some(field) = schema.find_field(name) else {
            return Ok(false);
        };

        let value = field.value(new)?;
        if current.get(name) != Some(&value) {
            unresolved = true;
        } else if stored.get(name) != Some(&value) {
            return Ok(false);
        }
    }

    if unresolved {
        return Ok(shared_keys_equal(stored, &current));
    }

    Ok(true)
}

fn shared_keys_equal(stored: &Value, current: &Value) -> bool {
    match (stored.as_object(), current.as_object()) {
        (Some(stored), Some(current)) => current
            .iter()
            .all(|(key, value)| stored.get(key).map_or(true, |old| old == value)),
        _ => stored == current,
    }
}
