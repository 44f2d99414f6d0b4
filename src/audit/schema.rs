//! Loggable schema descriptors
//!
//! A `Schema` is registered once per entity type and tells the plugin how to
//! read that type: its stored type name, its primary key, which fields are
//! subject to change tracking, whether a given value should be logged at
//! all, and which metadata to attach to each record.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{LoggableError, LoggableResult};

type KeyFn<E> = Box<dyn Fn(&E) -> String + Send + Sync>;
type PredicateFn<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
type ValueFn<E> = Box<dyn Fn(&E) -> serde_json::Result<Value> + Send + Sync>;
type ChangedFn<E> = Box<dyn Fn(&E, &E) -> bool + Send + Sync>;

/// A field declared subject to change tracking
pub struct LoggableField<E> {
    name: &'static str,
    changed: ChangedFn<E>,
    value: ValueFn<E>,
}

impl<E> LoggableField<E> {
    /// Stable field name used in diffs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the field differs between two states
    pub fn changed(&self, old: &E, new: &E) -> bool {
        (self.changed)(old, new)
    }

    /// Field value as JSON
    pub fn value(&self, entity: &E) -> LoggableResult<Value> {
        (self.value)(entity).map_err(|e| {
            LoggableError::Serialization(format!("Failed to serialize field {}: {}", self.name, e))
        })
    }
}

impl<E> fmt::Debug for LoggableField<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggableField")
            .field("name", &self.name)
            .finish()
    }
}

/// Change-tracking descriptor for one entity type
pub struct Schema<E> {
    name: String,
    primary_key: KeyFn<E>,
    fields: Vec<LoggableField<E>>,
    enabled: Option<PredicateFn<E>>,
    meta: Option<ValueFn<E>>,
}

impl<E: 'static> Schema<E> {
    /// Describe a type by its stored name and primary-key accessor
    ///
    /// The key is normalized to a string with its `Display` implementation.
    pub fn new<K, F>(name: impl Into<String>, primary_key: F) -> Self
    where
        K: fmt::Display,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            primary_key: Box::new(move |entity| primary_key(entity).to_string()),
            fields: Vec::new(),
            enabled: None,
            meta: None,
        }
    }

    /// Declare a loggable field
    ///
    /// Values are compared with the field type's `PartialEq` and stored in
    /// diffs through `Serialize`.
    pub fn field<T, F>(mut self, name: &'static str, get: F) -> Self
    where
        T: PartialEq + Serialize + ?Sized,
        F: Fn(&E) -> &T + Send + Sync + 'static,
    {
        let get = Arc::new(get);
        let get_value = Arc::clone(&get);

        self.fields.push(LoggableField {
            name,
            changed: Box::new(move |old, new| (*get)(old) != (*get)(new)),
            value: Box::new(move |entity| serde_json::to_value((*get_value)(entity))),
        });
        self
    }

    /// Only log entities for which the predicate holds
    pub fn enabled_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.enabled = Some(Box::new(predicate));
        self
    }

    /// Attach metadata to every record written for this type
    pub fn meta<M, F>(mut self, hook: F) -> Self
    where
        M: Serialize,
        F: Fn(&E) -> M + Send + Sync + 'static,
    {
        self.meta = Some(Box::new(move |entity| serde_json::to_value(hook(entity))));
        self
    }
}

impl<E> Schema<E> {
    /// Stored type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// String-normalized primary key of an entity
    pub fn key(&self, entity: &E) -> String {
        (self.primary_key)(entity)
    }

    /// Declared loggable fields in registration order
    pub fn fields(&self) -> &[LoggableField<E>] {
        &self.fields
    }

    /// Look up a loggable field by name
    pub fn find_field(&self, name: &str) -> Option<&LoggableField<E>> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether logging is enabled for this entity value
    pub fn is_enabled(&self, entity: &E) -> bool {
        self.enabled.as_ref().map_or(true, |predicate| predicate(entity))
    }

    /// Whether the type declares a metadata hook
    pub fn has_meta(&self) -> bool {
        self.meta.is_some()
    }

    /// Run the metadata hook, if any
    pub fn meta_value(&self, entity: &E) -> LoggableResult<Option<Value>> {
        match &self.meta {
            Some(hook) => hook(entity).map(Some).map_err(|e| {
                LoggableError::Serialization(format!(
                    "Failed to serialize {} metadata: {}",
                    self.name, e
                ))
            }),
            None => Ok(None),
        }
    }
}

impl<E> fmt::Debug for Schema<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("enabled", &self.enabled.is_some())
            .field("meta", &self.meta.is_some())
            .finish()
    }
}
