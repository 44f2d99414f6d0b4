//! Change-log record assembly and persistence

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{LoggableError, LoggableResult};

use super::diff::UpdateDiff;
use super::entry::{Action, ChangeLogRecord, NO_VALUE};
use super::logger::ChangeLogStore;
use super::schema::Schema;

/// Source of change-log record identifiers
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> LoggableResult<Uuid>;
}

/// Random UUID v4 identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&self) -> LoggableResult<Uuid> {
        Ok(Uuid::new_v4())
    }
}

/// Builds records and writes them through a `ChangeLogStore`
#[derive(Clone)]
pub struct ChangeLogWriter {
    store: Arc<dyn ChangeLogStore>,
    ids: Arc<dyn IdGenerator>,
}

impl ChangeLogWriter {
    pub fn new(store: Arc<dyn ChangeLogStore>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, ids }
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn ChangeLogStore> {
        &self.store
    }

    /// Assemble a record with no diff
    pub fn build<E: Serialize>(
        &self,
        schema: &Schema<E>,
        action: Action,
        entity: &E,
    ) -> LoggableResult<ChangeLogRecord> {
        let raw_object = serde_json::to_string(entity).map_err(|e| {
            LoggableError::Serialization(format!("Failed to serialize {}: {}", schema.name(), e))
        })?;

        let raw_meta = match schema.meta_value(entity)? {
            Some(meta) => meta.to_string(),
            None => NO_VALUE.to_string(),
        };

        let id = self.ids.next_id()?;

        Ok(ChangeLogRecord {
            id,
            created_at: Utc::now(),
            deleted_at: None,
            action,
            object_id: schema.key(entity),
            object_type: schema.name().to_string(),
            raw_object,
            raw_meta,
            raw_diff: NO_VALUE.to_string(),
        })
    }

    /// Write a create or delete record
    pub fn add_record<E: Serialize>(
        &self,
        schema: &Schema<E>,
        action: Action,
        entity: &E,
    ) -> LoggableResult<ChangeLogRecord> {
        let record = self.build(schema, action, entity)?;
        self.store.append(&record)?;
        Ok(record)
    }

    /// Write an update record carrying an optional diff
    pub fn add_update_record<E: Serialize>(
        &self,
        schema: &Schema<E>,
        entity: &E,
        diff: Option<&UpdateDiff>,
    ) -> LoggableResult<ChangeLogRecord> {
        let mut record = self.build(schema, Action::Update, entity)?;

        if let Some(diff) = diff {
            record.raw_diff = serde_json::to_string(diff).map_err(|e| {
                LoggableError::Serialization(format!("Failed to serialize diff: {}", e))
            })?;
        }

        self.store.append(&record)?;
        Ok(record)
    }
}

impl fmt::Debug for ChangeLogWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeLogWriter").finish_non_exhaustive()
    }
}
