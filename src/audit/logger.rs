//! Append-only change-log storage
//!
//! `ChangeLogStore` is the write path the plugin persists records through.
//! `JsonlChangeLog` keeps one JSON record per line and opens the file anew
//! for every append, so each record is written independently of whatever
//! write triggered it.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{LoggableError, LoggableResult};
use crate::storage::file_io::write_jsonl_atomic;

use super::entry::ChangeLogRecord;

/// Persistence and query interface for change-log records
pub trait ChangeLogStore: Send + Sync {
    /// Append one record
    fn append(&self, record: &ChangeLogRecord) -> LoggableResult<()>;

    /// All records in write order (oldest first), soft-deleted included
    fn read_all(&self) -> LoggableResult<Vec<ChangeLogRecord>>;

    /// Mark a record as deleted; returns false when no such record exists
    fn soft_delete(&self, id: Uuid) -> LoggableResult<bool>;

    /// Records of one object in write order
    fn records_for(
        &self,
        object_id: &str,
        include_deleted: bool,
    ) -> LoggableResult<Vec<ChangeLogRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.object_id == object_id && (include_deleted || !r.is_deleted()))
            .collect())
    }

    /// Most recent record of one object
    fn last_record(&self, object_id: &str, include_deleted: bool) -> LoggableResult<ChangeLogRecord> {
        self.records_for(object_id, include_deleted)?
            .pop()
            .ok_or_else(|| LoggableError::record_not_found(object_id))
    }

    /// Look up a record by id
    fn find(&self, id: Uuid) -> LoggableResult<Option<ChangeLogRecord>> {
        Ok(self.read_all()?.into_iter().find(|r| r.id == id))
    }
}

/// Change log stored as line-delimited JSON
#[derive(Debug)]
pub struct JsonlChangeLog {
    log_path: PathBuf,
    /// Serializes writers so lines never interleave
    write_lock: Mutex<()>,
}

impl JsonlChangeLog {
    /// Create a store that writes to the specified path
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Check if the log file exists
    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }

    /// Get the path to the log file
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Number of records in the log
    pub fn entry_count(&self) -> LoggableResult<usize> {
        Ok(self.read_all()?.len())
    }

    /// Most recent `count` records
    pub fn read_recent(&self, count: usize) -> LoggableResult<Vec<ChangeLogRecord>> {
        let all = self.read_all()?;
        let start = all.len().saturating_sub(count);
        Ok(all[start..].to_vec())
    }

    fn lock(&self) -> LoggableResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|e| {
            LoggableError::Persistence(format!("Failed to acquire change log lock: {}", e))
        })
    }
}

impl ChangeLogStore for JsonlChangeLog {
    fn append(&self, record: &ChangeLogRecord) -> LoggableResult<()> {
        let json = serde_json::to_string(record).map_err(|e| {
            LoggableError::Serialization(format!("Failed to serialize change log record: {}", e))
        })?;

        let _guard = self.lock()?;

        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LoggableError::Persistence(format!("Failed to create change log directory: {}", e))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| LoggableError::Persistence(format!("Failed to open change log: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| LoggableError::Persistence(format!("Failed to write record: {}", e)))?;

        file.flush()
            .map_err(|e| LoggableError::Persistence(format!("Failed to flush change log: {}", e)))?;

        Ok(())
    }

    fn read_all(&self) -> LoggableResult<Vec<ChangeLogRecord>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| LoggableError::Io(format!("Failed to open change log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                LoggableError::Io(format!(
                    "Failed to read change log line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let record: ChangeLogRecord = serde_json::from_str(&line).map_err(|e| {
                LoggableError::Json(format!(
                    "Failed to parse change log record at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            records.push(record);
        }

        Ok(records)
    }

    fn soft_delete(&self, id: Uuid) -> LoggableResult<bool> {
        let _guard = self.lock()?;

        let mut records = self.read_all()?;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };

        if record.deleted_at.is_none() {
            record.deleted_at = Some(Utc::now());
            write_jsonl_atomic(&self.log_path, &records)?;
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{Action, NO_VALUE};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn create_test_log() -> (JsonlChangeLog, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log = JsonlChangeLog::new(temp_dir.path().join("changelog.jsonl"));
        (log, temp_dir)
    }

    fn record(object_id: &str, action: Action) -> ChangeLogRecord {
        ChangeLogRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            deleted_at: None,
            action,
            object_id: object_id.into(),
            object_type: "User".into(),
            raw_object: format!(r#"{{"id":"{}"}}"#, object_id),
            raw_meta: NO_VALUE.into(),
            raw_diff: NO_VALUE.into(),
        }
    }

    #[test]
    fn test_append_and_read() {
        let (log, _temp) = create_test_log();
        let rec = record("1", Action::Create);

        log.append(&rec).unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records, vec![rec]);
    }

    #[test]
    fn test_empty_log() {
        let (log, _temp) = create_test_log();

        assert!(!log.exists());
        assert_eq!(log.entry_count().unwrap(), 0);
        assert!(log.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_last_record_per_object() {
        let (log, _temp) = create_test_log();
        log.append(&record("1", Action::Create)).unwrap();
        log.append(&record("2", Action::Create)).unwrap();
        log.append(&record("1", Action::Update)).unwrap();

        let last = log.last_record("1", false).unwrap();
        assert_eq!(last.action, Action::Update);
        assert_eq!(log.records_for("1", false).unwrap().len(), 2);
    }

    #[test]
    fn test_last_record_missing_is_not_found() {
        let (log, _temp) = create_test_log();
        let err = log.last_record("404", true).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_soft_delete_hides_record() {
        let (log, _temp) = create_test_log();
        let create = record("1", Action::Create);
        let update = record("1", Action::Update);
        log.append(&create).unwrap();
        log.append(&update).unwrap();

        assert!(log.soft_delete(update.id).unwrap());

        assert_eq!(log.last_record("1", false).unwrap().id, create.id);
        let with_deleted = log.last_record("1", true).unwrap();
        assert_eq!(with_deleted.id, update.id);
        assert!(with_deleted.is_deleted());
        assert_eq!(log.entry_count().unwrap(), 2);
    }

    #[test]
    fn test_soft_delete_unknown_id() {
        let (log, _temp) = create_test_log();
        log.append(&record("1", Action::Create)).unwrap();
        assert!(!log.soft_delete(Uuid::new_v4()).unwrap());
    }

    #[test]
    fn test_read_recent_and_find() {
        let (log, _temp) = create_test_log();
        let records: Vec<_> = (0..5).map(|i| record(&i.to_string(), Action::Create)).collect();
        for rec in &records {
            log.append(rec).unwrap();
        }

        let recent = log.read_recent(2).unwrap();
        assert_eq!(recent[0].object_id, "3");
        assert_eq!(recent[1].object_id, "4");

        assert_eq!(log.find(records[2].id).unwrap().unwrap().object_id, "2");
        assert!(log.find(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let (log, temp) = create_test_log();
        log.append(&record("1", Action::Create)).unwrap();

        let reopened = JsonlChangeLog::new(temp.path().join("changelog.jsonl"));
        assert_eq!(reopened.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let (log, _temp) = create_test_log();
        let log = Arc::new(log);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for i in 0..25 {
                        log.append(&record(&format!("{}-{}", t, i), Action::Create))
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.read_all().unwrap().len(), 100);
    }
}
