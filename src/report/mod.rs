pub mod csv;
pub mod json;
pub mod markdown;

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{Duration, Local, NaiveDate, Timelike, Utc};

use crate::db::Store;
use crate::error::Result;
use crate::models::{
    ActivityAnalysis, DashboardData, DayStatistics, SearchCriteria, Task, TaskActivity, TaskSummary,
    TimeEntry,
};
use crate::search::SearchService;
use crate::tasks::TaskService;
use crate::time::{date_range, format_duration, parse_time_range};
use crate::validation::Validator;

pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Summaries, activity analysis and dashboards built from stored entries
pub struct ReportingService<'a, S: Store> {
    store: &'a S,
    tasks: TaskService<'a, S>,
    search: SearchService<'a, S>,
    recent_limit: usize,
}

impl<'a, S: Store> ReportingService<'a, S> {
    pub fn new(store: &'a S, validator: Validator) -> Self {
        Self {
            store,
            tasks: TaskService::new(store, validator.clone()),
            search: SearchService::new(store, validator),
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }

    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    /// Everything recorded for one task
    pub fn get_task_summary(&self, task_id: i64) -> Result<TaskSummary> {
        let task = self.tasks.get_task(task_id)?;
        let now = Utc::now();

        let entries: Vec<TimeEntry> = self
            .store
            .list_time_entries()?
            .into_iter()
            .filter(|e| e.task_id == task.id)
            .collect();

        let total = entries
            .iter()
            .fold(Duration::zero(), |acc, e| acc + e.duration(now));
        let running_count = entries.iter().filter(|e| e.is_running()).count();

        Ok(TaskSummary {
            total_time: format_duration(total),
            session_count: entries.len(),
            running_count,
            first_entry: entries.iter().map(|e| e.start_time).min(),
            last_entry: entries.iter().map(|e| e.start_time).max(),
            is_running: running_count > 0,
            entries,
            task,
        })
    }

    /// Current session, recent tasks within `range` and today's totals
    pub fn get_dashboard_data(&self, range: &str) -> Result<DashboardData> {
        let range = parse_time_range(range)?;
        let current_session = self.tasks.get_current_session()?;
        let recent_tasks = self.search.get_recent_tasks(range, self.recent_limit)?;
        let today = self.get_today_statistics()?;

        Ok(DashboardData {
            range,
            current_session,
            recent_tasks,
            today,
        })
    }

    pub fn get_today_statistics(&self) -> Result<DayStatistics> {
        self.get_day_statistics(Local::now().date_naive())
    }

    /// Totals for one local calendar day
    pub fn get_day_statistics(&self, date: NaiveDate) -> Result<DayStatistics> {
        let range = date_range(date)?;
        let entries = self.search.search_time_entries(&SearchCriteria::in_range(range))?;

        let now = Utc::now();
        let today = Local::now().date_naive();

        let mut task_ids = HashSet::new();
        let mut completed_count = 0;
        let mut total = Duration::zero();

        for item in &entries {
            let entry = &item.entry;
            task_ids.insert(entry.task_id);

            match entry.end_time {
                Some(end) => {
                    completed_count += 1;
                    total = total + (end - entry.start_time);
                }
                // A running entry only counts when it started today
                None if entry.start_time.with_timezone(&Local).date_naive() == today => {
                    total = total + (now - entry.start_time);
                }
                None => {}
            }
        }

        Ok(DayStatistics {
            total_time: format_duration(total),
            task_count: task_ids.len(),
            session_count: entries.len(),
            completed_count,
        })
    }
}

/// Session length statistics over a set of entries; running entries count up to now
pub fn analyze_task_activity(entries: &[TimeEntry]) -> ActivityAnalysis {
    if entries.is_empty() {
        return ActivityAnalysis::default();
    }

    let now = Utc::now();
    let durations: Vec<Duration> = entries.iter().map(|e| e.duration(now)).collect();
    let total = durations.iter().fold(Duration::zero(), |acc, d| acc + *d);
    let hours: BTreeSet<u32> = entries
        .iter()
        .map(|e| e.start_time.with_timezone(&Local).hour())
        .collect();

    let count = i32::try_from(entries.len()).unwrap_or(i32::MAX);

    ActivityAnalysis {
        total_duration: total,
        average_duration: total / count,
        longest_session: durations.iter().copied().max().unwrap_or_else(Duration::zero),
        shortest_session: durations.iter().copied().min().unwrap_or_else(Duration::zero),
        session_count: entries.len(),
        productive_hours: hours.into_iter().collect(),
    }
}

/// Group entries by task.
///
/// The returned tasks carry only their id; callers fill in names if needed.
pub fn aggregate_task_data(entries: &[TimeEntry]) -> Vec<TaskActivity> {
    let now = Utc::now();
    let mut order = Vec::new();
    let mut groups: HashMap<i64, (TaskActivity, Duration)> = HashMap::new();

    for entry in entries {
        let (activity, total) = groups.entry(entry.task_id).or_insert_with(|| {
            order.push(entry.task_id);
            (
                TaskActivity {
                    task: Task::placeholder(entry.task_id),
                    last_worked: entry.start_time,
                    total_time: String::new(),
                    session_count: 0,
                    is_running: false,
                },
                Duration::zero(),
            )
        });

        activity.session_count += 1;
        activity.last_worked = activity.last_worked.max(entry.start_time);
        activity.is_running |= entry.is_running();
        *total = *total + entry.duration(now);
    }

    order
        .into_iter()
        .filter_map(|id| groups.remove(&id))
        .map(|(mut activity, total)| {
            activity.total_time = format_duration(total);
            activity
        })
        .collect()
}
