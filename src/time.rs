use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};

use crate::db::Store;
use crate::error::{Error, Result};
use crate::models::{SearchOptions, TimeEntry, TimeRange};
use crate::validation::parse_shorthand;

/// Duration arithmetic, range helpers and running-entry queries
pub struct TimeService<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> TimeService<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Resolve a shorthand like `2h` or `1mo` into `[now - duration, now]`
    pub fn parse_time_range(&self, shorthand: &str) -> Result<TimeRange> {
        parse_time_range(shorthand)
    }

    pub fn calculate_duration(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> String {
        calculate_duration(start, end)
    }

    pub fn get_running_entries(&self) -> Result<Vec<TimeEntry>> {
        let entries = self.store.search_time_entries(&SearchOptions::default())?;
        tracing::debug!(count = entries.len(), "loaded running entries");
        Ok(entries)
    }

    /// Stamp every running entry with the current time.
    ///
    /// Returns the stopped entries; an empty list when nothing was running.
    pub fn stop_running_entries(&self) -> Result<Vec<TimeEntry>> {
        let running = self.get_running_entries()?;
        let now = Utc::now();

        let mut stopped = Vec::with_capacity(running.len());
        for mut entry in running {
            entry.end_time = Some(now);
            let updated = self.store.update_time_entry(&entry)?;
            tracing::info!(
                entry_id = updated.id,
                task_id = updated.task_id,
                duration = %format_duration(now - updated.start_time),
                "stopped time entry"
            );
            stopped.push(updated);
        }

        Ok(stopped)
    }

    pub fn get_today_range(&self) -> Result<TimeRange> {
        today_range()
    }

    pub fn get_date_range(&self, date: NaiveDate) -> Result<TimeRange> {
        date_range(date)
    }
}

pub fn parse_time_range(shorthand: &str) -> Result<TimeRange> {
    let shorthand = shorthand.trim();
    if shorthand.is_empty() {
        return Err(Error::invalid_input("time range is empty"));
    }

    let duration = parse_shorthand(shorthand).ok_or_else(|| {
        Error::invalid_input(format!(
            "unrecognized time range '{}', expected e.g. 30m, 2h, 1d, 1w, 1mo, 1y",
            shorthand
        ))
    })?;

    let end = Utc::now();
    let start = end
        .checked_sub_signed(duration)
        .ok_or_else(|| Error::invalid_input(format!("time range '{}' is too large", shorthand)))?;

    Ok(TimeRange { start, end })
}

/// Format the span of an entry; running entries read "running for ..."
pub fn calculate_duration(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> String {
    match end {
        Some(end) => format_duration(end - start),
        None => format!("running for {}", format_duration(Utc::now() - start)),
    }
}

/// Format duration in human-readable format.
///
/// Components are truncated, never rounded. Negative input renders as `0h 0m`.
pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::zero() {
        return "0h 0m".to_string();
    }

    let hours = duration.num_hours();
    let minutes = duration.num_minutes() % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Local midnight today until now
pub fn today_range() -> Result<TimeRange> {
    date_range(Local::now().date_naive())
}

/// Local calendar-day boundaries for `date`; today ends at the current time
pub fn date_range(date: NaiveDate) -> Result<TimeRange> {
    let start = local_midnight(date)?;

    let end = if date == Local::now().date_naive() {
        Utc::now()
    } else {
        let next = date
            .succ_opt()
            .ok_or_else(|| Error::invalid_input(format!("no day follows {}", date)))?;
        local_midnight(next)?
    };

    Ok(TimeRange { start, end })
}

pub(crate) fn local_midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::invalid_input(format!("invalid date: {}", date)))?;

    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::invalid_input(format!("{} has no local midnight", date)))
}
