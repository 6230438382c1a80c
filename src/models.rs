use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A named task; `id` is 0 until the store assigns one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Task carrying only an id, used where full metadata is not at hand
    pub fn placeholder(id: i64) -> Self {
        Self {
            id,
            name: String::new(),
            created_at: DateTime::<Utc>::default(),
        }
    }
}

/// A work session on a task; no `end_time` means it is still running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: i64,
    pub task_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl TimeEntry {
    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }

    /// Stored duration, or time elapsed so far for a running entry
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.end_time.unwrap_or(now) - self.start_time
    }
}

/// Fields for a time entry that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTimeEntry {
    pub task_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl NewTimeEntry {
    pub fn running(task_id: i64, start_time: DateTime<Utc>) -> Self {
        Self {
            task_id,
            start_time,
            end_time: None,
        }
    }
}

/// A task paired with one of its entries
#[derive(Debug, Clone, Serialize)]
pub struct TaskSession {
    pub task: Task,
    pub entry: TimeEntry,
    pub duration: String,
}

/// Per-task rollup used by search and dashboards
#[derive(Debug, Clone, Serialize)]
pub struct TaskActivity {
    pub task: Task,
    pub last_worked: DateTime<Utc>,
    pub total_time: String,
    pub session_count: usize,
    pub is_running: bool,
}

/// Full per-task report
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub task: Task,
    pub entries: Vec<TimeEntry>,
    pub total_time: String,
    pub session_count: usize,
    pub running_count: usize,
    pub first_entry: Option<DateTime<Utc>>,
    pub last_entry: Option<DateTime<Utc>>,
    pub is_running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityAnalysis {
    pub total_duration: Duration,
    pub average_duration: Duration,
    pub longest_session: Duration,
    pub shortest_session: Duration,
    pub session_count: usize,
    /// Distinct local hours of day (0-23) in which a session started
    pub productive_hours: Vec<u32>,
}

impl Default for ActivityAnalysis {
    fn default() -> Self {
        Self {
            total_duration: Duration::zero(),
            average_duration: Duration::zero(),
            longest_session: Duration::zero(),
            shortest_session: Duration::zero(),
            session_count: 0,
            productive_hours: Vec::new(),
        }
    }
}

/// Totals for one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayStatistics {
    pub total_time: String,
    pub task_count: usize,
    pub session_count: usize,
    pub completed_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub time_range: Option<TimeRange>,
    pub text_filter: Option<String>,
    pub task_id: Option<i64>,
    pub running_only: bool,
}

impl SearchCriteria {
    pub fn in_range(time_range: TimeRange) -> Self {
        Self {
            time_range: Some(time_range),
            ..Self::default()
        }
    }

    /// True when no filter of any kind is set
    pub fn is_unfiltered(&self) -> bool {
        self.time_range.is_none()
            && self.text_filter.as_deref().map_or(true, str::is_empty)
            && self.task_id.is_none()
            && !self.running_only
    }
}

/// Filter parameters understood by the store.
///
/// With neither `start_time` nor `end_time` set the store returns running
/// entries only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub task_id: Option<i64>,
}

impl SearchOptions {
    pub fn has_time_bounds(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    RecentFirst,
    OldestFirst,
    Name,
    Duration,
}

impl SortOrder {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "recent" => Some(SortOrder::RecentFirst),
            "oldest" => Some(SortOrder::OldestFirst),
            "name" => Some(SortOrder::Name),
            "duration" => Some(SortOrder::Duration),
            _ => None,
        }
    }
}

/// An entry joined with the name of its task
#[derive(Debug, Clone, Serialize)]
pub struct TimeEntryWithTask {
    pub entry: TimeEntry,
    pub task_name: String,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub range: TimeRange,
    pub current_session: Option<TaskSession>,
    pub recent_tasks: Vec<TaskActivity>,
    pub today: DayStatistics,
}
