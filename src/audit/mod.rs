//! Change-log plugin
//!
//! Records a create, update or delete event for every mutation of a
//! registered entity type.
//!
//! # Architecture
//!
//! - `Schema`: per-type descriptor naming the primary key, the loggable
//!   fields, an optional enablement predicate and a metadata hook.
//! - `IdentityStore`: snapshots of entities as they were last loaded,
//!   used to diff the next update.
//! - `compute_update_diff`: sparse diff of the loggable fields.
//! - `ChangeLogWriter` / `ChangeLogStore`: build records and append them
//!   to the change log (`JsonlChangeLog` by default).
//! - `Plugin`: ties the above together and hooks into the store's
//!   callback chain.
//!
//! # Example
//!
//! ```rust,ignore
//! use loggable::audit::{self, Options, Schema};
//!
//! let plugin = audit::register(&db, Options::new().with_compute_diff())?;
//! plugin.register(
//!     Schema::new("User", |u: &User| u.id)
//!         .field("name", |u: &User| &u.name)
//!         .field("age", |u: &User| &u.age),
//! )?;
//!
//! let users = db.table::<User>()?;
//! users.load()?;                 // snapshots every row
//! users.update(&renamed)?;       // writes an update record with a diff
//!
//! let last = plugin.last_record("1", false)?;
//! ```

mod diff;
mod entry;
mod identity;
mod logger;
mod options;
mod plugin;
mod registry;
pub mod schema;
pub mod writer;

pub use diff::{compute_update_diff, is_equal, UpdateDiff};
pub use entry::{Action, ChangeLogRecord, NO_VALUE};
pub use identity::{IdentityKey, IdentityStore, Snapshot};
pub use logger::{ChangeLogStore, JsonlChangeLog};
pub use options::Options;
pub use plugin::{register, register_with_settings, Plugin, PLUGIN_NAME};
pub use registry::LoggableEntity;
pub use schema::{LoggableField, Schema};
pub use writer::{ChangeLogWriter, IdGenerator, RandomIds};
