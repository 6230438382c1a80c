use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{Error, PersistenceContext, Result};
use crate::models::{NewTimeEntry, SearchOptions, Task, TimeEntry};

/// Persistence contract consumed by the services.
///
/// Mutations that affect no row report [`Error::NotFound`]. Entry listings are
/// ordered by ascending start time.
pub trait Store {
    // Tasks
    fn create_task(&self, name: &str) -> Result<Task>;
    fn get_task(&self, id: i64) -> Result<Task>;
    fn list_tasks(&self) -> Result<Vec<Task>>;
    fn update_task(&self, task: &Task) -> Result<Task>;
    fn delete_task(&self, id: i64) -> Result<()>;

    // Time entries
    fn create_time_entry(&self, entry: &NewTimeEntry) -> Result<TimeEntry>;
    fn get_time_entry(&self, id: i64) -> Result<TimeEntry>;
    fn list_time_entries(&self) -> Result<Vec<TimeEntry>>;
    /// Entries whose start falls in `[start_time, end_time)`.
    ///
    /// Without either time bound only running entries are returned.
    fn search_time_entries(&self, options: &SearchOptions) -> Result<Vec<TimeEntry>>;
    fn update_time_entry(&self, entry: &TimeEntry) -> Result<TimeEntry>;
    fn delete_time_entry(&self, id: i64) -> Result<()>;
}

const ENTRY_COLUMNS: &str = "id, task_id, start_time, end_time";

/// SQLite-backed store
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).during("open database")?;

        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS time_entries (
                id INTEGER PRIMARY KEY,
                task_id INTEGER NOT NULL REFERENCES tasks(id),
                start_time TEXT NOT NULL,
                end_time TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_name ON tasks(name);
            CREATE INDEX IF NOT EXISTS idx_time_entries_task_id ON time_entries(task_id);
            CREATE INDEX IF NOT EXISTS idx_time_entries_start_time ON time_entries(start_time);

            -- at most one running entry
            CREATE UNIQUE INDEX IF NOT EXISTS idx_time_entries_single_running
                ON time_entries((end_time IS NULL)) WHERE end_time IS NULL;
            "#,
            )
            .during("initialize schema")?;

        Ok(())
    }

    fn query_entries(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<TimeEntry>> {
        let mut stmt = self.conn.prepare(sql).during("prepare entry query")?;

        let entries = stmt
            .query_map(params, row_to_entry)
            .during("query time entries")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .during("read time entries")?;

        Ok(entries)
    }
}

impl Store for Database {
    // ==================== Tasks ====================

    fn create_task(&self, name: &str) -> Result<Task> {
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO tasks (name, created_at) VALUES (?, ?)",
                params![name, format_datetime(now)],
            )
            .during("create task")?;

        let id = self.conn.last_insert_rowid();
        self.get_task(id)
    }

    fn get_task(&self, id: i64) -> Result<Task> {
        self.conn
            .query_row(
                "SELECT id, name, created_at FROM tasks WHERE id = ?",
                params![id],
                row_to_task,
            )
            .optional()
            .during("get task")?
            .ok_or_else(|| Error::not_found("task", id))
    }

    fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM tasks ORDER BY id")
            .during("prepare task query")?;

        let tasks = stmt
            .query_map([], row_to_task)
            .during("list tasks")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .during("read tasks")?;

        Ok(tasks)
    }

    fn update_task(&self, task: &Task) -> Result<Task> {
        let changed = self
            .conn
            .execute(
                "UPDATE tasks SET name = ? WHERE id = ?",
                params![task.name, task.id],
            )
            .during("update task")?;

        if changed == 0 {
            return Err(Error::not_found("task", task.id));
        }
        self.get_task(task.id)
    }

    fn delete_task(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?", params![id])
            .during("delete task")?;

        if changed == 0 {
            return Err(Error::not_found("task", id));
        }
        Ok(())
    }

    // ==================== Time entries ====================

    fn create_time_entry(&self, entry: &NewTimeEntry) -> Result<TimeEntry> {
        self.conn
            .execute(
                "INSERT INTO time_entries (task_id, start_time, end_time) VALUES (?, ?, ?)",
                params![
                    entry.task_id,
                    format_datetime(entry.start_time),
                    entry.end_time.map(format_datetime)
                ],
            )
            .during("create time entry")?;

        let id = self.conn.last_insert_rowid();
        self.get_time_entry(id)
    }

    fn get_time_entry(&self, id: i64) -> Result<TimeEntry> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM time_entries WHERE id = ?", ENTRY_COLUMNS),
                params![id],
                row_to_entry,
            )
            .optional()
            .during("get time entry")?
            .ok_or_else(|| Error::not_found("time entry", id))
    }

    fn list_time_entries(&self) -> Result<Vec<TimeEntry>> {
        self.query_entries(
            &format!(
                "SELECT {} FROM time_entries ORDER BY start_time, id",
                ENTRY_COLUMNS
            ),
            &[],
        )
    }

    fn search_time_entries(&self, options: &SearchOptions) -> Result<Vec<TimeEntry>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if !options.has_time_bounds() {
            conditions.push("end_time IS NULL");
        }
        if let Some(start) = options.start_time {
            conditions.push("start_time >= ?");
            values.push(Box::new(format_datetime(start)));
        }
        if let Some(end) = options.end_time {
            conditions.push("start_time < ?");
            values.push(Box::new(format_datetime(end)));
        }
        if let Some(task_id) = options.task_id {
            conditions.push("task_id = ?");
            values.push(Box::new(task_id));
        }

        let sql = format!(
            "SELECT {} FROM time_entries WHERE {} ORDER BY start_time, id",
            ENTRY_COLUMNS,
            conditions.join(" AND ")
        );
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();

        self.query_entries(&sql, &params)
    }

    fn update_time_entry(&self, entry: &TimeEntry) -> Result<TimeEntry> {
        let changed = self
            .conn
            .execute(
                "UPDATE time_entries SET task_id = ?, start_time = ?, end_time = ? WHERE id = ?",
                params![
                    entry.task_id,
                    format_datetime(entry.start_time),
                    entry.end_time.map(format_datetime),
                    entry.id
                ],
            )
            .during("update time entry")?;

        if changed == 0 {
            return Err(Error::not_found("time entry", entry.id));
        }
        self.get_time_entry(entry.id)
    }

    fn delete_time_entry(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM time_entries WHERE id = ?", params![id])
            .during("delete time entry")?;

        if changed == 0 {
            return Err(Error::not_found("time entry", id));
        }
        Ok(())
    }
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: parse_datetime(2, row.get::<_, String>(2)?)?,
    })
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<TimeEntry> {
    Ok(TimeEntry {
        id: row.get(0)?,
        task_id: row.get(1)?,
        start_time: parse_datetime(2, row.get::<_, String>(2)?)?,
        end_time: row
            .get::<_, Option<String>>(3)?
            .map(|s| parse_datetime(3, s))
            .transpose()?,
    })
}

/// Fixed-width UTC timestamps so text order matches time order
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(column: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}
