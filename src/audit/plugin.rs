//! The change-log plugin
//!
//! `Plugin` owns the schema registry, the identity store and the record
//! writer, and implements the store's `Callback` trait:
//!
//! - after query: every loaded row of a registered type is snapshotted
//! - after create / delete: a record with no diff is written
//! - after update: an optional lazy check, an optional diff against the
//!   snapshot, then a record
//!
//! Update failures are returned to the caller. Create and delete failures
//! are logged and discarded unless `Options::propagate_create_delete_errors`
//! is set. In both cases the table mutation itself is already committed.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::LoggableResult;
use crate::storage::{Callback, Database, Statement};

use super::diff::{compute_update_diff, is_equal, is_equal_to_stored, UpdateDiff};
use super::entry::{Action, ChangeLogRecord};
use super::identity::IdentityStore;
use super::logger::{ChangeLogStore, JsonlChangeLog};
use super::options::Options;
use super::registry::{ErasedSchema, LoggableEntity, Registry};
use super::schema::Schema;
use super::writer::{ChangeLogWriter, IdGenerator, RandomIds};

/// Callback name under which the plugin registers
pub const PLUGIN_NAME: &str = "loggable";

/// Create a plugin writing to the store's default change log and install it
pub fn register(db: &Database, options: Options) -> LoggableResult<Arc<Plugin>> {
    let store = Arc::new(JsonlChangeLog::new(db.paths().changelog_file()));
    Plugin::new(store, options).install(db)
}

/// Like `register`, with options read from the store's `config.json`
pub fn register_with_settings(db: &Database) -> LoggableResult<Arc<Plugin>> {
    let settings = Settings::load_or_create(db.paths())?;
    register(db, Options::from(&settings))
}

pub struct Plugin {
    registry: Registry,
    identity: Arc<IdentityStore>,
    writer: ChangeLogWriter,
    options: Options,
}

impl Plugin {
    /// Create a plugin persisting records through `store`
    pub fn new(store: Arc<dyn ChangeLogStore>, options: Options) -> Self {
        Self {
            registry: Registry::default(),
            identity: Arc::new(IdentityStore::new()),
            writer: ChangeLogWriter::new(store, Arc::new(RandomIds)),
            options,
        }
    }

    /// Use a custom record id source
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.writer = ChangeLogWriter::new(Arc::clone(self.writer.store()), ids);
        self
    }

    /// Share an identity store with other plugin instances
    pub fn with_identity_store(mut self, identity: Arc<IdentityStore>) -> Self {
        self.identity = identity;
        self
    }

    /// Install the plugin into the store's callback chain
    pub fn install(self, db: &Database) -> LoggableResult<Arc<Self>> {
        let plugin = Arc::new(self);
        db.register_callback(plugin.clone())?;
        tracing::info!(
            compute_diff = plugin.options.compute_diff,
            lazy_update = plugin.options.lazy_update,
            "change log plugin installed"
        );
        Ok(plugin)
    }

    /// Opt an entity type into change logging
    pub fn register<E: LoggableEntity>(&self, schema: Schema<E>) -> LoggableResult<()> {
        tracing::debug!(object_type = schema.name(), fields = schema.fields().len(), "registered schema");
        self.registry.insert(schema)
    }

    /// Whether `E` has a registered schema
    pub fn is_registered<E: LoggableEntity>(&self) -> LoggableResult<bool> {
        Ok(self.registry.get::<E>()?.is_some())
    }

    /// Names of all registered types
    pub fn registered_types(&self) -> LoggableResult<Vec<String>> {
        self.registry.names()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn identity(&self) -> &Arc<IdentityStore> {
        &self.identity
    }

    pub fn store(&self) -> &Arc<dyn ChangeLogStore> {
        self.writer.store()
    }

    /// Most recent record of an object
    pub fn last_record(&self, object_id: &str, include_deleted: bool) -> LoggableResult<ChangeLogRecord> {
        self.store().last_record(object_id, include_deleted)
    }

    /// All records of an object, oldest first
    pub fn records(&self, object_id: &str, include_deleted: bool) -> LoggableResult<Vec<ChangeLogRecord>> {
        self.store().records_for(object_id, include_deleted)
    }

    /// Snapshot a loaded entity; false when its type is not registered or disabled
    pub fn track_entity<E: LoggableEntity>(&self, entity: &E) -> LoggableResult<bool> {
        match self.registry.get::<E>()? {
            Some(schema) => self.capture_with(&schema, entity),
            None => Ok(false),
        }
    }

    /// Snapshot every element of a bulk load; returns how many were captured
    pub fn track_entities<E: LoggableEntity>(&self, entities: &[E]) -> LoggableResult<usize> {
        let Some(schema) = self.registry.get::<E>()? else {
            return Ok(0);
        };

        let mut captured = 0;
        for entity in entities {
            if self.capture_with(&schema, entity)? {
                captured += 1;
            }
        }
        Ok(captured)
    }

    /// Write a create record
    pub fn add_created<E: LoggableEntity>(&self, entity: &E) -> LoggableResult<Option<ChangeLogRecord>> {
        self.record_typed(Action::Create, entity)
    }

    /// Write an update record, subject to the lazy check
    pub fn add_updated<E: LoggableEntity>(&self, entity: &E) -> LoggableResult<Option<ChangeLogRecord>> {
        self.record_typed(Action::Update, entity)
    }

    /// Write a delete record
    pub fn add_deleted<E: LoggableEntity>(&self, entity: &E) -> LoggableResult<Option<ChangeLogRecord>> {
        self.record_typed(Action::Delete, entity)
    }

    /// Diff of an entity against its snapshot
    ///
    /// `None` when the type is not registered or no snapshot is cached.
    pub fn compute_update_diff<E: LoggableEntity>(&self, entity: &E) -> LoggableResult<Option<UpdateDiff>> {
        match self.registry.get::<E>()? {
            Some(schema) => self.diff_with(&schema, entity),
            None => Ok(None),
        }
    }

    fn record_typed<E: LoggableEntity>(
        &self,
        action: Action,
        entity: &E,
    ) -> LoggableResult<Option<ChangeLogRecord>> {
        match self.registry.get::<E>()? {
            Some(schema) => self.record_with(&schema, action, entity),
            None => Ok(None),
        }
    }

    pub(crate) fn capture_with<E: LoggableEntity>(
        &self,
        schema: &Schema<E>,
        entity: &E,
    ) -> LoggableResult<bool> {
        if !schema.is_enabled(entity) {
            return Ok(false);
        }

        let key = schema.key(entity);
        self.identity.save_entity(schema.name(), &key, entity.clone())?;
        tracing::debug!(object_type = schema.name(), object_id = %key, "captured snapshot");
        Ok(true)
    }

    pub(crate) fn record_with<E: LoggableEntity>(
        &self,
        schema: &Schema<E>,
        action: Action,
        entity: &E,
    ) -> LoggableResult<Option<ChangeLogRecord>> {
        if !schema.is_enabled(entity) {
            return Ok(None);
        }

        let record = match action {
            Action::Create | Action::Delete => self.writer.add_record(schema, action, entity)?,
            Action::Update => match self.update_with(schema, entity)? {
                Some(record) => record,
                None => return Ok(None),
            },
        };

        tracing::info!(
            action = %record.action,
            object_type = %record.object_type,
            object_id = %record.object_id,
            record_id = %record.id,
            "change log record written"
        );
        Ok(Some(record))
    }

    fn update_with<E: LoggableEntity>(
        &self,
        schema: &Schema<E>,
        entity: &E,
    ) -> LoggableResult<Option<ChangeLogRecord>> {
        let key = schema.key(entity);
        let snapshot = self.identity.get_entity::<E>(schema.name(), &key)?;

        if self.options.lazy_update && self.is_unchanged(schema, snapshot.as_deref(), entity, &key)? {
            tracing::debug!(object_type = schema.name(), object_id = %key, "update unchanged, skipped");
            return Ok(None);
        }

        let diff = match (&snapshot, self.options.compute_diff) {
            (Some(old), true) => Some(compute_update_diff(schema, old, entity)?),
            _ => None,
        };

        self.writer
            .add_update_record(schema, entity, diff.as_ref())
            .map(Some)
    }

    fn diff_with<E: LoggableEntity>(
        &self,
        schema: &Schema<E>,
        entity: &E,
    ) -> LoggableResult<Option<UpdateDiff>> {
        let key = schema.key(entity);
        match self.identity.get_entity::<E>(schema.name(), &key)? {
            Some(old) => compute_update_diff(schema, &old, entity).map(Some),
            None => Ok(None),
        }
    }

    /// Lazy-update check against the snapshot, or the last record without one
    fn is_unchanged<E: LoggableEntity>(
        &self,
        schema: &Schema<E>,
        snapshot: Option<&E>,
        entity: &E,
        key: &str,
    ) -> LoggableResult<bool> {
        let fields = &self.options.lazy_update_fields;

        if let Some(old) = snapshot {
            return Ok(is_equal(schema, old, entity, fields));
        }

        let last = self
            .store()
            .records_for(key, false)?
            .into_iter()
            .rev()
            .find(|record| record.object_type == schema.name());

        match last {
            Some(record) => is_equal_to_stored(schema, &record.object_value()?, entity, fields),
            None => Ok(false),
        }
    }

    fn lookup(&self, row: &dyn Any) -> LoggableResult<Option<Arc<dyn ErasedSchema>>> {
        self.registry.lookup(row)
    }

    fn dispatch_record(&self, action: Action, row: &dyn Any) -> LoggableResult<()> {
        if let Some(schema) = self.lookup(row)? {
            schema.record(self, action, row)?;
        }
        Ok(())
    }

    /// Create/delete hook body: failures are discarded unless configured otherwise
    fn after_write(&self, action: Action, stmt: &Statement<'_>) -> LoggableResult<()> {
        for row in stmt.dest.rows() {
            if let Err(err) = self.dispatch_record(action, row) {
                if self.options.propagate_create_delete_errors {
                    return Err(err);
                }
                tracing::warn!(
                    table = stmt.table,
                    %action,
                    error = %err,
                    "change log write failed, discarded"
                );
            }
        }
        Ok(())
    }
}

impl Callback for Plugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn after_query(&self, stmt: &Statement<'_>) -> LoggableResult<()> {
        for row in stmt.dest.rows() {
            let captured = match self.lookup(row)? {
                Some(schema) => schema.capture(self, row),
                None => continue,
            };

            if let Err(err) = captured {
                tracing::warn!(table = stmt.table, error = %err, "snapshot capture failed");
            }
        }
        Ok(())
    }

    fn after_create(&self, stmt: &Statement<'_>) -> LoggableResult<()> {
        self.after_write(Action::Create, stmt)
    }

    fn after_update(&self, stmt: &Statement<'_>) -> LoggableResult<()> {
        for row in stmt.dest.rows() {
            self.dispatch_record(Action::Update, row)?;
        }
        Ok(())
    }

    fn after_delete(&self, stmt: &Statement<'_>) -> LoggableResult<()> {
        self.after_write(Action::Delete, stmt)
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("registry", &self.registry)
            .field("identity", &self.identity)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::NO_VALUE;
    use crate::error::LoggableError;
    use serde::Serialize;
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct User {
        id: u32,
        name: String,
        age: u32,
        hidden: bool,
    }

    fn user(name: &str, age: u32) -> User {
        User {
            id: 1,
            name: name.into(),
            age,
            hidden: false,
        }
    }

    fn schema() -> Schema<User> {
        Schema::new("User", |u: &User| u.id)
            .field("name", |u: &User| &u.name)
            .field("age", |u: &User| &u.age)
            .enabled_when(|u: &User| !u.hidden)
    }

    fn plugin(options: Options) -> (Plugin, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(JsonlChangeLog::new(temp_dir.path().join("changelog.jsonl")));
        let plugin = Plugin::new(store, options);
        plugin.register(schema()).unwrap();
        (plugin, temp_dir)
    }

    struct FailingStore;

    impl ChangeLogStore for FailingStore {
        fn append(&self, _record: &ChangeLogRecord) -> LoggableResult<()> {
            Err(LoggableError::Persistence("disk full".into()))
        }

        fn read_all(&self) -> LoggableResult<Vec<ChangeLogRecord>> {
            Ok(Vec::new())
        }

        fn soft_delete(&self, _id: Uuid) -> LoggableResult<bool> {
            Ok(false)
        }
    }

    #[test]
    fn test_unregistered_type_is_ignored() {
        let (plugin, _temp) = plugin(Options::new());

        assert!(!plugin.track_entity(&"not loggable".to_string()).unwrap());
        assert!(plugin.add_created(&42u32).unwrap().is_none());
        assert!(plugin.store().read_all().unwrap().is_empty());
        assert!(plugin.is_registered::<User>().unwrap());
        assert!(!plugin.is_registered::<u32>().unwrap());
    }

    #[test]
    fn test_disabled_entity_is_ignored() {
        let (plugin, _temp) = plugin(Options::new());
        let mut hidden = user("a", 1);
        hidden.hidden = true;

        assert!(!plugin.track_entity(&hidden).unwrap());
        assert!(plugin.add_created(&hidden).unwrap().is_none());
        assert!(plugin.identity().is_empty().unwrap());
    }

    #[test]
    fn test_create_record_has_no_diff() {
        let (plugin, _temp) = plugin(Options::new().with_compute_diff());

        let record = plugin.add_created(&user("a", 1)).unwrap().unwrap();
        assert_eq!(record.action, Action::Create);
        assert_eq!(record.raw_diff, NO_VALUE);
        assert_eq!(
            record.object_value().unwrap(),
            json!({"id": 1, "name": "a", "age": 1, "hidden": false})
        );
    }

    #[test]
    fn test_update_diff_against_snapshot() {
        let (plugin, _temp) = plugin(Options::new().with_compute_diff());

        plugin.track_entity(&user("a", 1)).unwrap();
        let record = plugin.add_updated(&user("b", 1)).unwrap().unwrap();

        let diff = record.diff().unwrap().unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.get("name"), Some(&json!("b")));
    }

    #[test]
    fn test_update_without_snapshot_has_null_diff() {
        let (plugin, _temp) = plugin(Options::new().with_compute_diff());

        let record = plugin.add_updated(&user("b", 1)).unwrap().unwrap();
        assert!(record.diff().unwrap().is_none());
        assert_eq!(plugin.store().read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_diff_disabled_by_default() {
        let (plugin, _temp) = plugin(Options::new());

        plugin.track_entity(&user("a", 1)).unwrap();
        let record = plugin.add_updated(&user("b", 1)).unwrap().unwrap();
        assert!(!record.has_diff());
    }

    #[test]
    fn test_second_load_replaces_snapshot() {
        let (plugin, _temp) = plugin(Options::new().with_compute_diff());

        plugin.track_entity(&user("a", 1)).unwrap();
        plugin.track_entity(&user("b", 2)).unwrap();

        let diff = plugin.compute_update_diff(&user("b", 3)).unwrap().unwrap();
        let fields: Vec<_> = diff.fields().collect();
        assert_eq!(fields, vec!["age"]);
    }

    #[test]
    fn test_bulk_track() {
        let (plugin, _temp) = plugin(Options::new());
        let users: Vec<User> = (1..=3)
            .map(|id| User {
                id,
                ..user("x", 1)
            })
            .collect();

        assert_eq!(plugin.track_entities(&users).unwrap(), 3);
        assert_eq!(plugin.identity().len().unwrap(), 3);
    }

    #[test]
    fn test_lazy_update_skips_unchanged() {
        let (plugin, _temp) = plugin(Options::new().with_lazy_update(["name"]));

        plugin.track_entity(&user("a", 1)).unwrap();

        assert!(plugin.add_updated(&user("a", 5)).unwrap().is_none());
        assert!(plugin.add_updated(&user("b", 5)).unwrap().is_some());
        assert_eq!(plugin.store().read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_lazy_update_falls_back_to_last_record() {
        let (plugin, _temp) = plugin(Options::new().with_lazy_update(Vec::<String>::new()));

        plugin.add_created(&user("a", 1)).unwrap();

        assert!(plugin.add_updated(&user("a", 1)).unwrap().is_none());
        assert!(plugin.add_updated(&user("a", 2)).unwrap().is_some());
    }

    #[test]
    fn test_unchanged_update_with_snapshot_stores_empty_diff() {
        let (plugin, _temp) = plugin(Options::new().with_compute_diff());

        plugin.track_entity(&user("a", 1)).unwrap();
        let record = plugin.add_updated(&user("a", 1)).unwrap().unwrap();

        assert_eq!(record.raw_diff, "{}");
        assert!(record.has_diff());
        assert!(record.diff().unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_lazy_fallback_with_renamed_field() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(JsonlChangeLog::new(temp_dir.path().join("changelog.jsonl")));
        let plugin = Plugin::new(store, Options::new().with_lazy_update(Vec::<String>::new()));
        plugin
            .register(Schema::new("User", |u: &User| u.id).field("title", |u: &User| &u.name))
            .unwrap();

        plugin.add_created(&user("a", 1)).unwrap();

        assert!(plugin.add_updated(&user("a", 1)).unwrap().is_none());
        assert!(plugin.add_updated(&user("b", 1)).unwrap().is_some());
        assert_eq!(plugin.store().read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_lazy_fallback_ignores_other_types_with_same_id() {
        #[derive(Debug, Clone, Serialize)]
        struct Group {
            id: u32,
            title: String,
        }

        let (plugin, _temp) = plugin(Options::new().with_lazy_update(Vec::<String>::new()));
        plugin
            .register(Schema::new("Group", |g: &Group| g.id).field("title", |g: &Group| &g.title))
            .unwrap();

        plugin.add_created(&user("a", 1)).unwrap();
        plugin
            .add_created(&Group {
                id: 1,
                title: "admins".into(),
            })
            .unwrap();

        assert!(plugin.add_updated(&user("a", 1)).unwrap().is_none());
        assert_eq!(plugin.store().read_all().unwrap().len(), 2);
    }

    #[test]
    fn test_id_generator_override() {
        struct FixedIds(Uuid);

        impl IdGenerator for FixedIds {
            fn next_id(&self) -> LoggableResult<Uuid> {
                Ok(self.0)
            }
        }

        let id = Uuid::new_v4();
        let (plugin, _temp) = plugin(Options::new());
        let plugin = plugin.with_id_generator(Arc::new(FixedIds(id)));
        plugin.register(schema()).unwrap();

        let record = plugin.add_created(&user("a", 1)).unwrap().unwrap();
        assert_eq!(record.id, id);
    }

    #[test]
    fn test_typed_update_failure_propagates() {
        let plugin = Plugin::new(Arc::new(FailingStore), Options::new());
        plugin.register(schema()).unwrap();

        let err = plugin.add_updated(&user("a", 1)).unwrap_err();
        assert!(matches!(err, LoggableError::Persistence(_)));
    }

    #[test]
    fn test_create_hook_discards_failure_by_default() {
        let plugin = Plugin::new(Arc::new(FailingStore), Options::new());
        plugin.register(schema()).unwrap();

        let row = user("a", 1);
        assert!(plugin.after_create(&Statement::one("users", &row)).is_ok());
        assert!(plugin.after_delete(&Statement::one("users", &row)).is_ok());
        assert!(plugin.after_update(&Statement::one("users", &row)).is_err());
    }

    #[test]
    fn test_create_hook_propagates_when_configured() {
        let plugin = Plugin::new(
            Arc::new(FailingStore),
            Options::new().with_propagated_errors(),
        );
        plugin.register(schema()).unwrap();

        let row = user("a", 1);
        let err = plugin
            .after_create(&Statement::one("users", &row))
            .unwrap_err();
        assert!(err.is_change_log_failure());
    }

    #[test]
    fn test_query_hook_captures_registered_rows_only() {
        let (plugin, _temp) = plugin(Options::new());

        let row = user("a", 1);
        let other = 7u64;
        plugin
            .after_query(&Statement::many("mixed", vec![&row as &dyn Any, &other as &dyn Any]))
            .unwrap();

        assert_eq!(plugin.identity().len().unwrap(), 1);
        let cached = plugin.identity().get_entity::<User>("User", "1").unwrap();
        assert_eq!(cached.as_deref(), Some(&row));
    }
}
