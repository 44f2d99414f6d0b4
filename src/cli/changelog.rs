//! CLI commands for inspecting the change log

use clap::Subcommand;
use uuid::Uuid;

use crate::audit::{ChangeLogRecord, ChangeLogStore};
use crate::display::{format_record_details, format_record_list};
use crate::error::{LoggableError, LoggableResult};

/// Change-log subcommands
#[derive(Subcommand, Debug)]
pub enum LogCommands {
    /// List change-log records, oldest first
    List {
        /// Only records of this object id
        #[arg(short, long)]
        object: Option<String>,

        /// Include soft-deleted records
        #[arg(short, long)]
        all: bool,

        /// Show only the most recent N records
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show the most recent record of an object
    Last {
        /// Object id (string form of the primary key)
        object_id: String,

        /// Consider soft-deleted records too
        #[arg(long)]
        include_deleted: bool,
    },

    /// Show a record in detail
    Show {
        /// Record id or a unique prefix of it
        record: String,
    },

    /// Soft-delete a record
    Delete {
        /// Record id or a unique prefix of it
        record: String,
    },
}

/// Handle change-log commands
pub fn handle_log_command(store: &dyn ChangeLogStore, cmd: LogCommands) -> LoggableResult<()> {
    match cmd {
        LogCommands::List { object, all, limit } => {
            let records = match object {
                Some(object_id) => store.records_for(&object_id, all)?,
                None => store
                    .read_all()?
                    .into_iter()
                    .filter(|r| all || !r.is_deleted())
                    .collect(),
            };

            let skip = records.len().saturating_sub(limit);
            let recent: Vec<ChangeLogRecord> = records.into_iter().skip(skip).collect();
            print!("{}", format_record_list(&recent));
        }
        LogCommands::Last {
            object_id,
            include_deleted,
        } => {
            let record = store.last_record(&object_id, include_deleted)?;
            print!("{}", format_record_details(&record));
        }
        LogCommands::Show { record } => {
            let record = resolve_record(store, &record)?;
            print!("{}", format_record_details(&record));
        }
        LogCommands::Delete { record } => {
            let record = resolve_record(store, &record)?;
            if record.is_deleted() {
                println!("Record {} is already deleted.", record.id);
            } else if store.soft_delete(record.id)? {
                println!("Deleted record {}", record.id);
            }
        }
    }

    Ok(())
}

/// Find a record by full id or unique id prefix
pub fn resolve_record(store: &dyn ChangeLogStore, identifier: &str) -> LoggableResult<ChangeLogRecord> {
    if let Ok(id) = Uuid::parse_str(identifier) {
        return store
            .find(id)?
            .ok_or_else(|| LoggableError::record_not_found(identifier));
    }

    let prefix = identifier.to_lowercase();
    let mut matches: Vec<ChangeLogRecord> = store
        .read_all()?
        .into_iter()
        .filter(|r| !prefix.is_empty() && r.id.to_string().starts_with(&prefix))
        .collect();

    match matches.len() {
        0 => Err(LoggableError::record_not_found(identifier)),
        1 => Ok(matches.remove(0)),
        n => Err(LoggableError::Storage(format!(
            "Record prefix '{}' is ambiguous ({} matches)",
            identifier, n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Action, JsonlChangeLog, NO_VALUE};
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(object_id: &str) -> ChangeLogRecord {
        ChangeLogRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            deleted_at: None,
            action: Action::Create,
            object_id: object_id.into(),
            object_type: "User".into(),
            raw_object: "{}".into(),
            raw_meta: NO_VALUE.into(),
            raw_diff: NO_VALUE.into(),
        }
    }

    fn create_test_store() -> (TempDir, JsonlChangeLog) {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlChangeLog::new(temp_dir.path().join("changelog.jsonl"));
        (temp_dir, store)
    }

    #[test]
    fn test_resolve_full_id_and_prefix() {
        let (_temp_dir, store) = create_test_store();
        let target = record("1");
        store.append(&target).unwrap();

        let full = resolve_record(&store, &target.id.to_string()).unwrap();
        assert_eq!(full.id, target.id);

        let prefix: String = target.id.to_string().chars().take(8).collect();
        let short = resolve_record(&store, &prefix.to_uppercase()).unwrap();
        assert_eq!(short.id, target.id);
    }

    #[test]
    fn test_resolve_missing() {
        let (_temp_dir, store) = create_test_store();
        store.append(&record("1")).unwrap();

        let err = resolve_record(&store, &Uuid::new_v4().to_string()).unwrap_err();
        assert!(err.is_not_found());
        assert!(resolve_record(&store, "").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_command_soft_deletes() {
        let (_temp_dir, store) = create_test_store();
        let target = record("1");
        store.append(&target).unwrap();

        handle_log_command(
            &store,
            LogCommands::Delete {
                record: target.id.to_string(),
            },
        )
        .unwrap();

        assert!(store.last_record("1", false).unwrap_err().is_not_found());
        assert!(store.last_record("1", true).unwrap().is_deleted());
    }
}
