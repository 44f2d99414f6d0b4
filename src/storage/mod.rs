//! Entity store hosting the change-log plugin
//!
//! Provides JSON-file tables with atomic writes and a lifecycle callback
//! chain. Plugins hook into the chain to observe loads and mutations.

pub mod callbacks;
pub mod file_io;
pub mod table;

pub use callbacks::{Callback, CallbackChain, Dest, Stage, Statement};
pub use file_io::{read_json, write_json_atomic, write_jsonl_atomic};
pub use table::{Model, Table};

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::paths::LoggablePaths;
use crate::error::LoggableError;

/// Entry point of the entity store
///
/// Each model's table is opened once and shared, so every handle sees the
/// same rows.
#[derive(Debug)]
pub struct Database {
    paths: LoggablePaths,
    callbacks: CallbackChain,
    tables: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Database {
    /// Open the store, creating its directories if needed
    pub fn open(paths: LoggablePaths) -> Result<Self, LoggableError> {
        paths.ensure_directories()?;

        Ok(Self {
            paths,
            callbacks: CallbackChain::new(),
            tables: RwLock::new(HashMap::new()),
        })
    }

    /// Get the paths configuration
    pub fn paths(&self) -> &LoggablePaths {
        &self.paths
    }

    /// Register a lifecycle callback for every table of this store
    pub fn register_callback(&self, callback: Arc<dyn Callback>) -> Result<(), LoggableError> {
        self.callbacks.register(callback)
    }

    /// The shared callback chain
    pub fn callbacks(&self) -> &CallbackChain {
        &self.callbacks
    }

    /// Shared table of a model, read from disk on first use
    ///
    /// Opening fires no callbacks; use `Table::load` to snapshot rows.
    pub fn table<E: Model>(&self) -> Result<Arc<Table<E>>, LoggableError> {
        if let Some(table) = self.cached_table::<E>()? {
            return Ok(table);
        }

        let mut tables = self.tables.write().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if let Some(table) = tables
            .get(&TypeId::of::<E>())
            .and_then(|t| Arc::clone(t).downcast::<Table<E>>().ok())
        {
            return Ok(table);
        }

        let table = Arc::new(Table::open(
            self.paths.table_file(E::TABLE),
            self.callbacks.clone(),
        )?);
        tables.insert(TypeId::of::<E>(), table.clone());
        tracing::debug!(table = E::TABLE, "opened table");
        Ok(table)
    }

    fn cached_table<E: Model>(&self) -> Result<Option<Arc<Table<E>>>, LoggableError> {
        let tables = self.tables.read().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(tables
            .get(&TypeId::of::<E>())
            .and_then(|t| Arc::clone(t).downcast::<Table<E>>().ok()))
    }
}
