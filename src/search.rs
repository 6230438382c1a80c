use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::db::Store;
use crate::error::Result;
use crate::models::{
    SearchCriteria, SearchOptions, SortOrder, Task, TaskActivity, TimeEntry, TimeEntryWithTask,
    TimeRange,
};
use crate::time::{calculate_duration, format_duration};
use crate::validation::Validator;

/// Criteria-based filtering and sorting over tasks and entries
pub struct SearchService<'a, S: Store> {
    store: &'a S,
    validator: Validator,
}

impl<'a, S: Store> SearchService<'a, S> {
    pub fn new(store: &'a S, validator: Validator) -> Self {
        Self { store, validator }
    }

    /// Tasks with at least one entry matching `criteria`, folded into activity rollups
    pub fn search_tasks(&self, criteria: &SearchCriteria) -> Result<Vec<TaskActivity>> {
        let options = self.build_search_options(criteria)?;
        let now = Utc::now();

        let mut entries_by_task: HashMap<i64, Vec<TimeEntry>> = HashMap::new();
        for entry in self.fetch_entries(&options)? {
            if criteria.running_only && !entry.is_running() {
                continue;
            }
            entries_by_task.entry(entry.task_id).or_default().push(entry);
        }

        let mut activities = Vec::new();
        for task in self.store.list_tasks()? {
            if criteria.task_id.is_some_and(|id| id != task.id) {
                continue;
            }
            if !matches_text(&task.name, criteria.text_filter.as_deref()) {
                continue;
            }

            let Some(entries) = entries_by_task.remove(&task.id) else {
                continue;
            };
            activities.push(fold_activity(task, &entries, now));
        }

        tracing::debug!(count = activities.len(), "task search finished");
        Ok(activities)
    }

    /// Entries matching `criteria`, joined with their task name
    pub fn search_time_entries(&self, criteria: &SearchCriteria) -> Result<Vec<TimeEntryWithTask>> {
        let entries = if criteria.is_unfiltered() {
            self.store.list_time_entries()?
        } else {
            let options = self.build_search_options(criteria)?;
            self.fetch_entries(&options)?
        };

        let mut names: HashMap<i64, String> = HashMap::new();
        let mut results = Vec::new();

        for entry in entries {
            if criteria.running_only && !entry.is_running() {
                continue;
            }

            let task_name = match names.get(&entry.task_id) {
                Some(name) => name.clone(),
                None => {
                    let task = self.store.get_task(entry.task_id)?;
                    names.insert(task.id, task.name.clone());
                    task.name
                }
            };

            if !matches_text(&task_name, criteria.text_filter.as_deref()) {
                continue;
            }

            let duration = calculate_duration(entry.start_time, entry.end_time);
            results.push(TimeEntryWithTask {
                entry,
                task_name,
                duration,
            });
        }

        tracing::debug!(count = results.len(), "entry search finished");
        Ok(results)
    }

    /// Most recently worked tasks in `time_range`; a `limit` of 0 means no limit
    pub fn get_recent_tasks(&self, time_range: TimeRange, limit: usize) -> Result<Vec<TaskActivity>> {
        let mut tasks = self.search_tasks(&SearchCriteria::in_range(time_range))?;
        sort_tasks(&mut tasks, SortOrder::RecentFirst);
        if limit > 0 {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    pub fn find_tasks_with_activity(&self, time_range: TimeRange) -> Result<Vec<TaskActivity>> {
        Ok(self
            .search_tasks(&SearchCriteria::in_range(time_range))?
            .into_iter()
            .filter(|activity| activity.session_count > 0)
            .collect())
    }

    /// Translate criteria into store filters.
    ///
    /// Options without time bounds make the store return running entries only.
    pub fn build_search_options(&self, criteria: &SearchCriteria) -> Result<SearchOptions> {
        let (start_time, end_time) = match criteria.time_range {
            Some(range) => (Some(range.start), Some(range.end)),
            None => (None, None),
        };
        self.validator.validate_search_range(start_time, end_time)?;

        Ok(SearchOptions {
            start_time,
            end_time,
            task_id: criteria.task_id,
        })
    }

    fn fetch_entries(&self, options: &SearchOptions) -> Result<Vec<TimeEntry>> {
        if options.has_time_bounds() {
            return self.store.search_time_entries(options);
        }

        // No time bounds: list everything rather than hit the running-only default
        Ok(self
            .store
            .list_time_entries()?
            .into_iter()
            .filter(|e| options.task_id.map_or(true, |id| e.task_id == id))
            .collect())
    }
}

pub fn sort_tasks(tasks: &mut [TaskActivity], order: SortOrder) {
    match order {
        SortOrder::RecentFirst => tasks.sort_by(|a, b| b.last_worked.cmp(&a.last_worked)),
        SortOrder::OldestFirst => tasks.sort_by(|a, b| a.last_worked.cmp(&b.last_worked)),
        SortOrder::Name => tasks.sort_by(|a, b| a.task.name.cmp(&b.task.name)),
        // Only formatted totals are available here; keep input order
        SortOrder::Duration => {}
    }
}

pub fn sort_time_entries(entries: &mut [TimeEntryWithTask], order: SortOrder) {
    match order {
        SortOrder::RecentFirst => entries.sort_by(|a, b| b.entry.start_time.cmp(&a.entry.start_time)),
        SortOrder::OldestFirst => entries.sort_by(|a, b| a.entry.start_time.cmp(&b.entry.start_time)),
        SortOrder::Name => entries.sort_by(|a, b| a.task_name.cmp(&b.task_name)),
        SortOrder::Duration => {}
    }
}

fn matches_text(name: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(filter) if !filter.is_empty() => name.to_lowercase().contains(&filter.to_lowercase()),
        _ => true,
    }
}

fn fold_activity(task: Task, entries: &[TimeEntry], now: DateTime<Utc>) -> TaskActivity {
    let total = entries
        .iter()
        .fold(Duration::zero(), |acc, e| acc + e.duration(now));
    let last_worked = entries
        .iter()
        .map(|e| e.start_time)
        .max()
        .unwrap_or(task.created_at);

    TaskActivity {
        last_worked,
        total_time: format_duration(total),
        session_count: entries.len(),
        is_running: entries.iter().any(TimeEntry::is_running),
        task,
    }
}
