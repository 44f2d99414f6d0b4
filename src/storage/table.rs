//! Generic JSON-backed table
//!
//! Holds rows in memory keyed by primary key and rewrites the table file
//! after every mutation. Callbacks run after the write has been committed,
//! so a failing callback never undoes the mutation it observed.

use std::any::Any;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::LoggableError;

use super::callbacks::{CallbackChain, Stage, Statement};
use super::file_io::{read_json, write_json_atomic};

/// A row type that can be stored in a table
pub trait Model: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table (and file) name
    const TABLE: &'static str;

    /// Primary key of the row
    fn primary_key(&self) -> String;
}

/// Serializable table file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableData<E> {
    rows: Vec<E>,
}

impl<E> Default for TableData<E> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

/// Repository for rows of one model
pub struct Table<E: Model> {
    path: PathBuf,
    data: RwLock<BTreeMap<String, E>>,
    callbacks: CallbackChain,
}

impl<E: Model> Table<E> {
    /// Create a table backed by the given file
    pub fn new(path: PathBuf, callbacks: CallbackChain) -> Self {
        Self {
            path,
            data: RwLock::new(BTreeMap::new()),
            callbacks,
        }
    }

    /// Open a table, reading the rows already on disk
    ///
    /// No callbacks run; rows become visible to plugins once queried.
    pub fn open(path: PathBuf, callbacks: CallbackChain) -> Result<Self, LoggableError> {
        let file_data: TableData<E> = read_json(&path)?;
        let rows = file_data
            .rows
            .into_iter()
            .map(|row| (row.primary_key(), row))
            .collect();

        Ok(Self {
            path,
            data: RwLock::new(rows),
            callbacks,
        })
    }

    /// Load rows from disk; after-query callbacks see every loaded row
    pub fn load(&self) -> Result<Vec<E>, LoggableError> {
        let file_data: TableData<E> = read_json(&self.path)?;

        {
            let mut data = self.data.write().map_err(|e| {
                LoggableError::Storage(format!("Failed to acquire write lock: {}", e))
            })?;

            data.clear();
            for row in &file_data.rows {
                data.insert(row.primary_key(), row.clone());
            }
        }

        self.run_many(Stage::Query, &file_data.rows)?;
        Ok(file_data.rows)
    }

    /// Get a row by primary key
    pub fn find(&self, key: &str) -> Result<Option<E>, LoggableError> {
        let row = {
            let data = self.data.read().map_err(|e| {
                LoggableError::Storage(format!("Failed to acquire read lock: {}", e))
            })?;
            data.get(key).cloned()
        };

        if let Some(row) = &row {
            self.run_one(Stage::Query, row)?;
        }

        Ok(row)
    }

    /// Get all rows ordered by primary key
    pub fn all(&self) -> Result<Vec<E>, LoggableError> {
        let rows: Vec<E> = {
            let data = self.data.read().map_err(|e| {
                LoggableError::Storage(format!("Failed to acquire read lock: {}", e))
            })?;
            data.values().cloned().collect()
        };

        self.run_many(Stage::Query, &rows)?;
        Ok(rows)
    }

    /// Insert a new row
    pub fn create(&self, row: &E) -> Result<(), LoggableError> {
        let key = row.primary_key();

        self.mutate(|data| {
            if data.contains_key(&key) {
                return Err(LoggableError::Duplicate {
                    entity_type: E::TABLE,
                    identifier: key.clone(),
                });
            }
            data.insert(key.clone(), row.clone());
            Ok(())
        })?;

        self.run_one(Stage::Create, row)
    }

    /// Replace an existing row
    pub fn update(&self, row: &E) -> Result<(), LoggableError> {
        let key = row.primary_key();

        self.mutate(|data| match data.get_mut(&key) {
            Some(existing) => {
                *existing = row.clone();
                Ok(())
            }
            None => Err(LoggableError::row_not_found(key.clone())),
        })?;

        self.run_one(Stage::Update, row)
    }

    /// Remove a row, returning its last state
    pub fn delete(&self, key: &str) -> Result<E, LoggableError> {
        let removed = self.mutate(|data| {
            data.remove(key)
                .ok_or_else(|| LoggableError::row_not_found(key))
        })?;

        self.run_one(Stage::Delete, &removed)?;
        Ok(removed)
    }

    /// Count rows
    pub fn count(&self) -> Result<usize, LoggableError> {
        let data = self.data.read().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.len())
    }

    /// Apply a change and persist the table, restoring memory on write failure
    fn mutate<T, F>(&self, change: F) -> Result<T, LoggableError>
    where
        F: FnOnce(&mut BTreeMap<String, E>) -> Result<T, LoggableError>,
    {
        let mut data = self.data.write().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let before = data.clone();
        let out = change(&mut data)?;

        let file_data = TableData {
            rows: data.values().cloned().collect(),
        };
        if let Err(err) = write_json_atomic(&self.path, &file_data) {
            *data = before;
            return Err(err);
        }

        Ok(out)
    }

    fn run_one(&self, stage: Stage, row: &E) -> Result<(), LoggableError> {
        self.callbacks
            .run(stage, &Statement::one(E::TABLE, row as &dyn Any))
    }

    fn run_many(&self, stage: Stage, rows: &[E]) -> Result<(), LoggableError> {
        let dest: Vec<&dyn Any> = rows.iter().map(|r| r as &dyn Any).collect();
        self.callbacks.run(stage, &Statement::many(E::TABLE, dest))
    }
}
