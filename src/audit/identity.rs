//! Identity store for pre-mutation snapshots
//!
//! Maps (object type, primary key) to the last-seen copy of an entity. The
//! store grows without bound: entries are replaced on every load and never
//! evicted. Long-running processes with many distinct keys would need an
//! LRU or TTL policy on top of this map.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::{LoggableError, LoggableResult};

/// Type-erased cached copy of an entity
pub type Snapshot = Arc<dyn Any + Send + Sync>;

/// Cache key of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub object_type: String,
    pub key: String,
}

impl IdentityKey {
    pub fn new(object_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            key: key.into(),
        }
    }
}

/// Thread-safe snapshot cache
///
/// A single mutex guards the map; it is held only for the map operation
/// itself.
#[derive(Default)]
pub struct IdentityStore {
    entries: Mutex<HashMap<IdentityKey, Snapshot>>,
}

impl IdentityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the snapshot for a key
    pub fn save(&self, object_type: &str, key: &str, snapshot: Snapshot) -> LoggableResult<()> {
        let mut entries = self.entries.lock().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire identity store lock: {}", e))
        })?;

        entries.insert(IdentityKey::new(object_type, key), snapshot);
        Ok(())
    }

    /// Retrieve the snapshot for a key
    pub fn get(&self, object_type: &str, key: &str) -> LoggableResult<Option<Snapshot>> {
        let entries = self.entries.lock().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire identity store lock: {}", e))
        })?;

        Ok(entries.get(&IdentityKey::new(object_type, key)).cloned())
    }

    /// Store a copy of a concrete entity
    pub fn save_entity<E>(&self, object_type: &str, key: &str, entity: E) -> LoggableResult<()>
    where
        E: Send + Sync + 'static,
    {
        self.save(object_type, key, Arc::new(entity))
    }

    /// Retrieve a snapshot as a concrete entity type
    ///
    /// Returns `None` when nothing is cached or the cached value has another type.
    pub fn get_entity<E>(&self, object_type: &str, key: &str) -> LoggableResult<Option<Arc<E>>>
    where
        E: Send + Sync + 'static,
    {
        Ok(self
            .get(object_type, key)?
            .and_then(|snapshot| snapshot.downcast::<E>().ok()))
    }

    /// Number of cached snapshots
    pub fn len(&self) -> LoggableResult<usize> {
        let entries = self.entries.lock().map_err(|e| {
            LoggableError::Storage(format!("Failed to acquire identity store lock: {}", e))
        })?;

        Ok(entries.len())
    }

    /// Whether the store holds no snapshots
    pub fn is_empty(&self) -> LoggableResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl fmt::Debug for IdentityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.entries.lock().map(|e| e.len()).unwrap_or_default();
        f.debug_struct("IdentityStore").field("entries", &len).finish()
    }
}
