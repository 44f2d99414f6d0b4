//! Registry of loggable entity types
//!
//! Maps a Rust type to its `Schema`. Host callbacks only see rows as
//! `&dyn Any`, so each schema is also stored behind `ErasedSchema`, which
//! downcasts the row and forwards to the typed plugin operations. Rows of
//! unregistered types are ignored.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::error::{LoggableError, LoggableResult};

use super::entry::{Action, ChangeLogRecord};
use super::plugin::Plugin;
use super::schema::Schema;

/// Bounds every loggable entity type satisfies
pub trait LoggableEntity: Clone + Serialize + Send + Sync + 'static {}

impl<T> LoggableEntity for T where T: Clone + Serialize + Send + Sync + 'static {}

/// Schema operations callable without knowing the entity type
pub(crate) trait ErasedSchema: Send + Sync {
    fn name(&self) -> &str;

    /// Snapshot a loaded row; false when the row was skipped
    fn capture(&self, plugin: &Plugin, row: &dyn Any) -> LoggableResult<bool>;

    /// Write the change-log record for a mutated row
    fn record(
        &self,
        plugin: &Plugin,
        action: Action,
        row: &dyn Any,
    ) -> LoggableResult<Option<ChangeLogRecord>>;
}

impl<E: LoggableEntity> ErasedSchema for Schema<E> {
    fn name(&self) -> &str {
        Schema::name(self)
    }

    fn capture(&self, plugin: &Plugin, row: &dyn Any) -> LoggableResult<bool> {
        match row.downcast_ref::<E>() {
            Some(entity) => plugin.capture_with(self, entity),
            None => Ok(false),
        }
    }

    fn record(
        &self,
        plugin: &Plugin,
        action: Action,
        row: &dyn Any,
    ) -> LoggableResult<Option<ChangeLogRecord>> {
        match row.downcast_ref::<E>() {
            Some(entity) => plugin.record_with(self, action, entity),
            None => Ok(None),
        }
    }
}

struct Entry {
    erased: Arc<dyn ErasedSchema>,
    typed: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub(crate) struct Registry {
    entries: RwLock<HashMap<TypeId, Entry>>,
}

impl Registry {
    /// Register or replace the schema of `E`
    pub(crate) fn insert<E: LoggableEntity>(&self, schema: Schema<E>) -> LoggableResult<()> {
        let schema = Arc::new(schema);
        let mut entries = self.entries.write().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire registry lock: {}", e))
        })?;

        let previous = entries.insert(
            TypeId::of::<E>(),
            Entry {
                erased: schema.clone(),
                typed: schema,
            },
        );

        if let Some(previous) = previous {
            tracing::debug!(object_type = previous.erased.name(), "replaced schema");
        }

        Ok(())
    }

    /// Typed schema of `E`
    pub(crate) fn get<E: LoggableEntity>(&self) -> LoggableResult<Option<Arc<Schema<E>>>> {
        let entries = self.entries.read().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire registry lock: {}", e))
        })?;

        Ok(entries
            .get(&TypeId::of::<E>())
            .and_then(|entry| Arc::clone(&entry.typed).downcast::<Schema<E>>().ok()))
    }

    /// Schema matching the concrete type of a row
    pub(crate) fn lookup(&self, row: &dyn Any) -> LoggableResult<Option<Arc<dyn ErasedSchema>>> {
        let entries = self.entries.read().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire registry lock: {}", e))
        })?;

        Ok(entries
            .get(&(*row).type_id())
            .map(|entry| Arc::clone(&entry.erased)))
    }

    /// Registered type names, sorted
    pub(crate) fn names(&self) -> LoggableResult<Vec<String>> {
        let entries = self.entries.read().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire registry lock: {}", e))
        })?;

        let mut names: Vec<String> = entries.values().map(|e| e.erased.name().to_string()).collect();
        names.sort();
        Ok(names)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.names().unwrap_or_default())
            .finish()
    }
}
