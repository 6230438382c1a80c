use chrono::Utc;

use crate::db::Store;
use crate::error::Result;
use crate::models::{NewTimeEntry, Task, TaskSession, TimeEntry};
use crate::time::{calculate_duration, TimeService};
use crate::validation::Validator;

/// Task CRUD and the start / resume / stop session lifecycle.
///
/// At most one entry may be running at a time. Every operation that starts a
/// session stops all running entries before creating the new one.
pub struct TaskService<'a, S: Store> {
    store: &'a S,
    time: TimeService<'a, S>,
    validator: Validator,
}

impl<'a, S: Store> TaskService<'a, S> {
    pub fn new(store: &'a S, validator: Validator) -> Self {
        Self {
            store,
            time: TimeService::new(store),
            validator,
        }
    }

    // ==================== Tasks ====================

    pub fn create_task(&self, name: &str) -> Result<Task> {
        let name = self.validator.validate_task_name(name)?;
        let task = self.store.create_task(&name)?;
        tracing::info!(task_id = task.id, name = %task.name, "created task");
        Ok(task)
    }

    pub fn get_task(&self, id: i64) -> Result<Task> {
        self.validator.validate_id("id", id)?;
        self.store.get_task(id)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.store.list_tasks()
    }

    pub fn rename_task(&self, id: i64, name: &str) -> Result<Task> {
        let mut task = self.get_task(id)?;
        task.name = self.validator.validate_task_name(name)?;
        self.validator.validate_task(&task)?;
        self.store.update_task(&task)
    }

    /// Delete a task that has no entries left
    pub fn delete_task(&self, id: i64) -> Result<()> {
        self.validator.validate_id("id", id)?;
        self.store.delete_task(id)
    }

    /// Delete a task together with every entry that references it.
    ///
    /// Entries go first; if the final task delete fails the task is left
    /// without entries and can be deleted again.
    pub fn delete_task_with_entries(&self, id: i64) -> Result<usize> {
        let task = self.get_task(id)?;

        let entries: Vec<TimeEntry> = self
            .store
            .list_time_entries()?
            .into_iter()
            .filter(|e| e.task_id == task.id)
            .collect();

        for entry in &entries {
            self.store.delete_time_entry(entry.id)?;
        }
        self.store.delete_task(task.id)?;

        tracing::info!(task_id = task.id, entries = entries.len(), "deleted task");
        Ok(entries.len())
    }

    // ==================== Sessions ====================

    /// Start working on a task by name, creating the task on first use
    pub fn start_new_task(&self, name: &str) -> Result<TaskSession> {
        let name = self.validator.validate_task_name(name)?;

        self.time.stop_running_entries()?;

        let task = match self.find_task_by_name(&name)? {
            Some(task) => task,
            None => {
                let task = self.store.create_task(&name)?;
                tracing::info!(task_id = task.id, name = %task.name, "created task");
                task
            }
        };

        self.begin_session(task)
    }

    /// Start a new session on an existing task
    pub fn resume_task(&self, id: i64) -> Result<TaskSession> {
        let task = self.get_task(id)?;

        self.time.stop_running_entries()?;

        self.begin_session(task)
    }

    /// The running session, or `None` when nothing is running
    pub fn get_current_session(&self) -> Result<Option<TaskSession>> {
        let running = self.time.get_running_entries()?;

        if running.len() > 1 {
            tracing::warn!(
                count = running.len(),
                "multiple running entries found, reporting the earliest"
            );
        }

        let Some(entry) = running.into_iter().next() else {
            return Ok(None);
        };

        let task = self.store.get_task(entry.task_id)?;
        Ok(Some(self.create_task_session(task, entry)))
    }

    /// Stop whatever is running and return the sessions that ended.
    ///
    /// Sessions longer than the configured limit are still stopped; they are
    /// only reported through [`TaskService::check_session`].
    pub fn stop_current(&self) -> Result<Vec<TaskSession>> {
        self.time
            .stop_running_entries()?
            .into_iter()
            .map(|entry| -> Result<TaskSession> {
                let task = self.store.get_task(entry.task_id)?;
                let session = self.create_task_session(task, entry);
                if let Err(err) = self.check_session(&session) {
                    tracing::warn!(entry_id = session.entry.id, "{}", err);
                }
                Ok(session)
            })
            .collect()
    }

    /// Validate a finished session against the configured limits
    pub fn check_session(&self, session: &TaskSession) -> Result<()> {
        self.validator.validate_entry(&session.entry)
    }

    pub fn create_task_session(&self, task: Task, entry: TimeEntry) -> TaskSession {
        let duration = calculate_duration(entry.start_time, entry.end_time);
        TaskSession {
            task,
            entry,
            duration,
        }
    }

    fn find_task_by_name(&self, name: &str) -> Result<Option<Task>> {
        Ok(self
            .store
            .list_tasks()?
            .into_iter()
            .find(|task| task.name == name))
    }

    fn begin_session(&self, task: Task) -> Result<TaskSession> {
        let new_entry = NewTimeEntry::running(task.id, Utc::now());
        self.validator.validate_new_entry(&new_entry)?;

        let entry = self.store.create_time_entry(&new_entry)?;
        tracing::info!(task_id = task.id, entry_id = entry.id, name = %task.name, "started session");

        Ok(self.create_task_session(task, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::{Error, ValidationKind};
    use crate::models::SearchOptions;
    use chrono::Duration;
    use std::cell::Cell;
    use tempfile::{tempdir, TempDir};

    /// Store wrapper that fails one named operation on demand
    struct FlakyStore {
        inner: Database,
        fail_on: Cell<Option<&'static str>>,
    }

    impl FlakyStore {
        fn new(inner: Database) -> Self {
            Self {
                inner,
                fail_on: Cell::new(None),
            }
        }

        fn fail(&self, operation: &'static str) {
            self.fail_on.set(Some(operation));
        }

        fn heal(&self) {
            self.fail_on.set(None);
        }

        fn check(&self, operation: &'static str) -> Result<()> {
            if self.fail_on.get() != Some(operation) {
                return Ok(());
            }
            Err(Error::Persistence {
                operation,
                source: rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
                    Some("database is locked".to_string()),
                ),
            })
        }
    }

    impl Store for FlakyStore {
        fn create_task(&self, name: &str) -> Result<Task> {
            self.check("create_task")?;
            self.inner.create_task(name)
        }

        fn get_task(&self, id: i64) -> Result<Task> {
            self.check("get_task")?;
            self.inner.get_task(id)
        }

        fn list_tasks(&self) -> Result<Vec<Task>> {
            self.check("list_tasks")?;
            self.inner.list_tasks()
        }

        fn update_task(&self, task: &Task) -> Result<Task> {
            self.check("update_task")?;
            self.inner.update_task(task)
        }

        fn delete_task(&self, id: i64) -> Result<()> {
            self.check("delete_task")?;
            self.inner.delete_task(id)
        }

        fn create_time_entry(&self, entry: &NewTimeEntry) -> Result<TimeEntry> {
            self.check("create_time_entry")?;
            self.inner.create_time_entry(entry)
        }

        fn get_time_entry(&self, id: i64) -> Result<TimeEntry> {
            self.check("get_time_entry")?;
            self.inner.get_time_entry(id)
        }

        fn list_time_entries(&self) -> Result<Vec<TimeEntry>> {
            self.check("list_time_entries")?;
            self.inner.list_time_entries()
        }

        fn search_time_entries(&self, options: &SearchOptions) -> Result<Vec<TimeEntry>> {
            self.check("search_time_entries")?;
            self.inner.search_time_entries(options)
        }

        fn update_time_entry(&self, entry: &TimeEntry) -> Result<TimeEntry> {
            self.check("update_time_entry")?;
            self.inner.update_time_entry(entry)
        }

        fn delete_time_entry(&self, id: i64) -> Result<()> {
            self.check("delete_time_entry")?;
            self.inner.delete_time_entry(id)
        }
    }

    fn open_temp() -> (TempDir, Database) {
        let dir = tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn running_count(db: &Database) -> usize {
        db.list_time_entries()
            .unwrap()
            .iter()
            .filter(|e| e.is_running())
            .count()
    }

    #[test]
    fn test_start_switches_running_task() {
        let (_dir, db) = open_temp();
        let tasks = TaskService::new(&db, Validator::new());

        let first = tasks.start_new_task("Task 1").unwrap();
        let current = tasks.get_current_session().unwrap().unwrap();
        assert_eq!(current.task.name, "Task 1");
        assert!(current.entry.end_time.is_none());
        assert!(current.duration.starts_with("running for"));

        tasks.start_new_task("Task 2").unwrap();
        let current = tasks.get_current_session().unwrap().unwrap();
        assert_eq!(current.task.name, "Task 2");

        let first_entry = db.get_time_entry(first.entry.id).unwrap();
        assert!(first_entry.end_time.is_some());
        assert_eq!(running_count(&db), 1);
    }

    #[test]
    fn test_start_reuses_task_by_exact_name() {
        let (_dir, db) = open_temp();
        let tasks = TaskService::new(&db, Validator::new());

        let a = tasks.start_new_task("  Deep work ").unwrap();
        let b = tasks.start_new_task("Deep work").unwrap();
        let c = tasks.start_new_task("deep work").unwrap();

        assert_eq!(a.task.id, b.task.id);
        assert_ne!(a.task.id, c.task.id);
        assert_eq!(tasks.list_tasks().unwrap().len(), 2);
        assert_eq!(db.list_time_entries().unwrap().len(), 3);
    }

    #[test]
    fn test_start_rejects_invalid_name_without_side_effects() {
        let (_dir, db) = open_temp();
        let tasks = TaskService::new(&db, Validator::new());

        tasks.start_new_task("Task 1").unwrap();
        let err = tasks.start_new_task("bad\tname").unwrap_err();
        assert!(err.is_validation());

        // the original session keeps running
        assert_eq!(running_count(&db), 1);
        assert_eq!(tasks.list_tasks().unwrap().len(), 1);
    }

    #[test]
    fn test_resume_task() {
        let (_dir, db) = open_temp();
        let tasks = TaskService::new(&db, Validator::new());

        let first = tasks.start_new_task("Task 1").unwrap();
        tasks.start_new_task("Task 2").unwrap();

        let resumed = tasks.resume_task(first.task.id).unwrap();
        assert_eq!(resumed.task.id, first.task.id);
        assert_ne!(resumed.entry.id, first.entry.id);
        assert_eq!(running_count(&db), 1);

        let err = tasks.resume_task(999).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(running_count(&db), 1);
    }

    #[test]
    fn test_running_invariant_across_operations() {
        let (_dir, db) = open_temp();
        let tasks = TaskService::new(&db, Validator::new());

        let a = tasks.start_new_task("A").unwrap();
        assert!(running_count(&db) <= 1);
        tasks.start_new_task("B").unwrap();
        assert!(running_count(&db) <= 1);
        tasks.stop_current().unwrap();
        assert_eq!(running_count(&db), 0);
        tasks.resume_task(a.task.id).unwrap();
        assert_eq!(running_count(&db), 1);
        tasks.start_new_task("C").unwrap();
        tasks.resume_task(a.task.id).unwrap();
        assert_eq!(running_count(&db), 1);
    }

    #[test]
    fn test_stop_current() {
        let (_dir, db) = open_temp();
        let tasks = TaskService::new(&db, Validator::new());

        assert!(tasks.get_current_session().unwrap().is_none());
        assert!(tasks.stop_current().unwrap().is_empty());

        tasks.start_new_task("Task").unwrap();
        let stopped = tasks.stop_current().unwrap();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].task.name, "Task");
        assert!(!stopped[0].duration.starts_with("running"));

        assert!(tasks.get_current_session().unwrap().is_none());
        assert!(tasks.stop_current().unwrap().is_empty());
    }

    #[test]
    fn test_delete_task_with_entries() {
        let (_dir, db) = open_temp();
        let tasks = TaskService::new(&db, Validator::new());

        let task = tasks.create_task("Doomed").unwrap();
        let keep = tasks.create_task("Keeper").unwrap();
        let now = Utc::now();
        for hours in 1..=3 {
            db.create_time_entry(&NewTimeEntry {
                task_id: task.id,
                start_time: now - Duration::hours(hours * 2),
                end_time: Some(now - Duration::hours(hours * 2) + Duration::minutes(30)),
            })
            .unwrap();
        }
        tasks.resume_task(keep.id).unwrap();

        // a task with entries cannot be removed on its own
        assert!(matches!(tasks.delete_task(task.id), Err(Error::Persistence { .. })));

        assert_eq!(tasks.delete_task_with_entries(task.id).unwrap(), 3);
        assert!(tasks.get_task(task.id).unwrap_err().is_not_found());
        assert!(db.list_time_entries().unwrap().iter().all(|e| e.task_id == keep.id));

        assert!(tasks.delete_task_with_entries(task.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_rename_task() {
        let (_dir, db) = open_temp();
        let tasks = TaskService::new(&db, Validator::new());

        let task = tasks.create_task("Old").unwrap();
        assert_eq!(tasks.rename_task(task.id, " New ").unwrap().name, "New");
        assert!(tasks.rename_task(task.id, "").unwrap_err().is_validation());
        assert!(tasks.rename_task(42, "Other").unwrap_err().is_not_found());
        assert!(tasks.get_task(0).unwrap_err().is_validation());
    }

    #[test]
    fn test_failed_stop_creates_nothing() {
        let (_dir, db) = open_temp();
        let store = FlakyStore::new(db);
        let tasks = TaskService::new(&store, Validator::new());

        let first = tasks.start_new_task("Running").unwrap();
        store.fail("update_time_entry");

        let err = tasks.start_new_task("Next").unwrap_err();
        assert!(matches!(err, Error::Persistence { operation: "update_time_entry", .. }));
        assert!(tasks.resume_task(first.task.id).is_err());

        store.heal();
        let entries = store.list_time_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_running());
        assert_eq!(store.list_tasks().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_task_delete_leaves_empty_task() {
        let (_dir, db) = open_temp();
        let store = FlakyStore::new(db);
        let tasks = TaskService::new(&store, Validator::new());

        let session = tasks.start_new_task("Doomed").unwrap();
        tasks.stop_current().unwrap();
        tasks.resume_task(session.task.id).unwrap();

        store.fail("delete_task");
        assert!(tasks.delete_task_with_entries(session.task.id).is_err());

        store.heal();
        assert!(tasks.get_task(session.task.id).is_ok());
        assert!(store.list_time_entries().unwrap().is_empty());

        assert_eq!(tasks.delete_task_with_entries(session.task.id).unwrap(), 0);
        assert!(tasks.get_task(session.task.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_persistence_error_keeps_cause() {
        let (_dir, db) = open_temp();
        let store = FlakyStore::new(db);
        let tasks = TaskService::new(&store, Validator::new());

        store.fail("create_task");
        let err = tasks.create_task("Task").unwrap_err();
        assert!(!err.is_validation());
        assert!(!err.is_not_found());

        let source = std::error::Error::source(&err).unwrap();
        let cause = source.downcast_ref::<rusqlite::Error>().unwrap();
        assert_eq!(cause.sqlite_error_code(), Some(rusqlite::ErrorCode::DatabaseBusy));
    }

    #[test]
    fn test_session_limit_follows_validator() {
        let (_dir, db) = open_temp();
        let task = db.create_task("Long haul").unwrap();
        db.create_time_entry(&NewTimeEntry::running(task.id, Utc::now() - Duration::hours(2)))
            .unwrap();

        let strict = TaskService::new(&db, Validator::with_limits(255, Duration::hours(1)));
        let relaxed = TaskService::new(&db, Validator::new());

        // stopping never fails on length
        let stopped = strict.stop_current().unwrap();
        assert_eq!(stopped.len(), 1);
        assert!(stopped[0].entry.end_time.is_some());

        match strict.check_session(&stopped[0]) {
            Err(Error::Validation(errors)) => {
                assert!(errors.has("end_time", ValidationKind::InvalidRange))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(relaxed.check_session(&stopped[0]).is_ok());
    }
}
