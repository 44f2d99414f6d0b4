//! Lifecycle callbacks of the entity store
//!
//! Tables run every registered `Callback` after a row is loaded, created,
//! updated or deleted. The callback sees the affected rows as `&dyn Any`
//! and decides for itself which concrete types it cares about.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::{LoggableError, LoggableResult};

/// Rows a statement operated on
pub enum Dest<'a> {
    One(&'a dyn Any),
    Many(Vec<&'a dyn Any>),
}

impl<'a> Dest<'a> {
    /// Iterate over the affected rows
    pub fn rows(&self) -> Vec<&'a dyn Any> {
        match self {
            Dest::One(row) => vec![*row],
            Dest::Many(rows) => rows.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Dest::One(_) => 1,
            Dest::Many(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A completed table operation handed to callbacks
pub struct Statement<'a> {
    /// Table the operation ran against
    pub table: &'a str,
    /// Affected rows
    pub dest: Dest<'a>,
}

impl<'a> Statement<'a> {
    pub fn one(table: &'a str, row: &'a dyn Any) -> Self {
        Self {
            table,
            dest: Dest::One(row),
        }
    }

    pub fn many(table: &'a str, rows: Vec<&'a dyn Any>) -> Self {
        Self {
            table,
            dest: Dest::Many(rows),
        }
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("table", &self.table)
            .field("rows", &self.dest.len())
            .finish()
    }
}

/// Hook invoked after table operations
///
/// Every method defaults to doing nothing.
pub trait Callback: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &str;

    fn after_query(&self, _stmt: &Statement<'_>) -> LoggableResult<()> {
        Ok(())
    }

    fn after_create(&self, _stmt: &Statement<'_>) -> LoggableResult<()> {
        Ok(())
    }

    fn after_update(&self, _stmt: &Statement<'_>) -> LoggableResult<()> {
        Ok(())
    }

    fn after_delete(&self, _stmt: &Statement<'_>) -> LoggableResult<()> {
        Ok(())
    }
}

/// Lifecycle stage a callback runs at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Query,
    Create,
    Update,
    Delete,
}

/// Shared, ordered list of callbacks
///
/// Tables hold a clone, so callbacks registered later still apply to
/// tables opened earlier.
#[derive(Clone, Default)]
pub struct CallbackChain {
    callbacks: Arc<RwLock<Vec<Arc<dyn Callback>>>>,
}

impl CallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback to the chain
    pub fn register(&self, callback: Arc<dyn Callback>) -> LoggableResult<()> {
        let mut callbacks = self.callbacks.write().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        tracing::debug!(callback = callback.name(), "registered callback");
        callbacks.push(callback);
        Ok(())
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.callbacks.read().map(|c| c.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every callback for a stage
    ///
    /// All callbacks run even when one fails; the first error is returned.
    pub fn run(&self, stage: Stage, stmt: &Statement<'_>) -> LoggableResult<()> {
        let callbacks = self
            .callbacks
            .read()
            .map_err(|e| LoggableError::Storage(format!("Failed to acquire read lock: {}", e)))?
            .clone();

        let mut first_error = None;

        for callback in &callbacks {
            let result = match stage {
                Stage::Query => callback.after_query(stmt),
                Stage::Create => callback.after_create(stmt),
                Stage::Update => callback.after_update(stmt),
                Stage::Delete => callback.after_delete(stmt),
            };

            if let Err(err) = result {
                tracing::debug!(callback = callback.name(), ?stage, error = %err, "callback failed");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for CallbackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackChain")
            .field("callbacks", &self.len())
            .finish()
    }
}
