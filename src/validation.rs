use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::error::{Result, ValidationErrors, ValidationKind};
use crate::models::{NewTimeEntry, Task, TimeEntry};

pub const DEFAULT_MIN_NAME_LENGTH: usize = 1;
pub const DEFAULT_MAX_NAME_LENGTH: usize = 255;
pub const DEFAULT_MAX_DURATION_HOURS: i64 = 24;

const PAST_WINDOW_DAYS: i64 = 10 * 365;
const FUTURE_WINDOW_DAYS: i64 = 365;

fn task_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9 \-_.,!?()]+$").expect("task name pattern is valid"))
}

fn shorthand_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)(mo|m|h|d|w|y)$").expect("shorthand pattern is valid"))
}

/// Parse a shorthand token such as `30m`, `2h` or `3mo` into a duration.
///
/// Months are 30 days and years 365 days.
pub fn parse_shorthand(s: &str) -> Option<Duration> {
    let caps = shorthand_pattern().captures(s)?;
    let count: i64 = caps.get(1)?.as_str().parse().ok()?;
    if count <= 0 {
        return None;
    }

    let unit = match caps.get(2)?.as_str() {
        "m" => Duration::minutes(1),
        "h" => Duration::hours(1),
        "d" => Duration::days(1),
        "w" => Duration::days(7),
        "mo" => Duration::days(30),
        "y" => Duration::days(365),
        _ => return None,
    };

    unit.checked_mul(i32::try_from(count).ok()?)
}

/// Stateless checks shared by every service, with configurable limits
#[derive(Debug, Clone)]
pub struct Validator {
    min_name_length: usize,
    max_name_length: usize,
    max_duration: Duration,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            min_name_length: DEFAULT_MIN_NAME_LENGTH,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_duration: Duration::hours(DEFAULT_MAX_DURATION_HOURS),
        }
    }
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_name_length: usize, max_duration: Duration) -> Self {
        Self {
            max_name_length,
            max_duration,
            ..Self::default()
        }
    }

    // ==================== Predicates ====================

    pub fn is_valid_task_name(&self, name: &str) -> bool {
        let trimmed = name.trim();
        let length = trimmed.chars().count();
        length >= self.min_name_length
            && length <= self.max_name_length
            && task_name_pattern().is_match(trimmed)
    }

    pub fn is_valid_time_shorthand(&self, s: &str) -> bool {
        parse_shorthand(s).is_some()
    }

    pub fn is_reasonable_date(&self, t: DateTime<Utc>) -> bool {
        is_reasonable_date_at(t, Utc::now())
    }

    pub fn is_valid_duration(&self, d: Duration) -> bool {
        d > Duration::zero() && d <= self.max_duration
    }

    pub fn is_valid_id(&self, id: i64) -> bool {
        id > 0
    }

    /// Entry-level range: open-ended is fine, otherwise start must be strictly before end
    pub fn is_valid_time_range(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
        end.map_or(true, |end| start < end)
    }

    /// Search-level range: equal bounds are allowed
    pub fn is_valid_date_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> bool {
        match (start, end) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }

    // ==================== Field validators ====================

    /// Validate a task name and return it trimmed
    pub fn validate_task_name(&self, name: &str) -> Result<String> {
        let mut errors = ValidationErrors::new();
        self.check_task_name(name, &mut errors);
        errors.into_result()?;
        Ok(name.trim().to_string())
    }

    pub fn validate_task(&self, task: &Task) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if task.id < 0 {
            errors.add("id", ValidationKind::InvalidValue, "id must not be negative", task.id);
        }
        self.check_task_name(&task.name, &mut errors);
        errors.into_result()
    }

    pub fn validate_new_entry(&self, entry: &NewTimeEntry) -> Result<()> {
        let mut errors = ValidationErrors::new();
        self.check_entry(entry.task_id, entry.start_time, entry.end_time, &mut errors);
        errors.into_result()
    }

    pub fn validate_entry(&self, entry: &TimeEntry) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if !self.is_valid_id(entry.id) {
            errors.add("id", ValidationKind::InvalidValue, "id must be positive", entry.id);
        }
        self.check_entry(entry.task_id, entry.start_time, entry.end_time, &mut errors);
        errors.into_result()
    }

    pub fn validate_id(&self, field: &'static str, id: i64) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if !self.is_valid_id(id) {
            errors.add(field, ValidationKind::InvalidValue, "id must be positive", id);
        }
        errors.into_result()
    }

    pub fn validate_time_shorthand(&self, s: &str) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if s.trim().is_empty() {
            errors.add("range", ValidationKind::Required, "time range is required", s);
        } else if !self.is_valid_time_shorthand(s) {
            errors.add(
                "range",
                ValidationKind::InvalidFormat,
                "expected a positive count followed by one of m, h, d, w, mo, y",
                s,
            );
        }
        errors.into_result()
    }

    pub fn validate_search_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if !self.is_valid_date_range(start, end) {
            errors.add(
                "end_time",
                ValidationKind::InvalidRange,
                "search end must not be before search start",
                format_optional(end),
            );
        }
        errors.into_result()
    }

    fn check_task_name(&self, name: &str, errors: &mut ValidationErrors) {
        let trimmed = name.trim();

        // Nothing further to check on an empty name
        if trimmed.is_empty() {
            errors.add("name", ValidationKind::Required, "task name is required", name);
            return;
        }

        let length = trimmed.chars().count();
        if length < self.min_name_length || length > self.max_name_length {
            errors.add(
                "name",
                ValidationKind::InvalidLength,
                format!(
                    "task name must be between {} and {} characters",
                    self.min_name_length, self.max_name_length
                ),
                length,
            );
        }

        if !task_name_pattern().is_match(trimmed) {
            errors.add(
                "name",
                ValidationKind::InvalidCharacter,
                "task name may only contain letters, digits, spaces and - _ . , ! ? ( )",
                trimmed,
            );
        }
    }

    fn check_entry(
        &self,
        task_id: i64,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        errors: &mut ValidationErrors,
    ) {
        if !self.is_valid_id(task_id) {
            errors.add("task_id", ValidationKind::InvalidValue, "task id must be positive", task_id);
        }

        let now = Utc::now();

        if start_time.timestamp() == 0 {
            errors.add("start_time", ValidationKind::Required, "start time is required", start_time);
        } else if !is_reasonable_date_at(start_time, now) {
            errors.add(
                "start_time",
                ValidationKind::InvalidValue,
                "start time is outside the reasonable window",
                start_time,
            );
        }

        let Some(end) = end_time else {
            return;
        };

        if !is_reasonable_date_at(end, now) {
            errors.add(
                "end_time",
                ValidationKind::InvalidValue,
                "end time is outside the reasonable window",
                end,
            );
        }

        if !self.is_valid_time_range(start_time, end_time) {
            errors.add(
                "end_time",
                ValidationKind::InvalidRange,
                "end time must be after start time",
                end,
            );
        } else if !self.is_valid_duration(end - start_time) {
            errors.add(
                "end_time",
                ValidationKind::InvalidRange,
                format!(
                    "session must not exceed {} hours",
                    self.max_duration.num_hours()
                ),
                end,
            );
        }
    }
}

fn is_reasonable_date_at(t: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - Duration::days(PAST_WINDOW_DAYS) < t && t < now + Duration::days(FUTURE_WINDOW_DAYS)
}

fn format_optional(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.to_rfc3339()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn validation_errors(result: Result<()>) -> ValidationErrors {
        match result {
            Err(Error::Validation(errors)) => errors,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_task_names() {
        let v = Validator::new();

        assert!(v.is_valid_task_name("Write report"));
        assert!(v.is_valid_task_name("  fix-bug_42 (v1.2), done? yes!  "));
        assert!(!v.is_valid_task_name(""));
        assert!(!v.is_valid_task_name("   "));
        assert!(!v.is_valid_task_name("tab\there"));
        assert!(!v.is_valid_task_name("line\nbreak"));
        assert!(!v.is_valid_task_name("email@example"));
        assert!(!v.is_valid_task_name(&"a".repeat(256)));
        assert!(v.is_valid_task_name(&"a".repeat(255)));
    }

    #[test]
    fn test_validate_task_name_trims() {
        let v = Validator::new();
        assert_eq!(v.validate_task_name("  Task 1 ").unwrap(), "Task 1");
    }

    #[test]
    fn test_empty_name_short_circuits() {
        let v = Validator::new();
        let errors = validation_errors(v.validate_task_name("   ").map(|_| ()));
        assert_eq!(errors.errors().len(), 1);
        assert!(errors.has("name", ValidationKind::Required));
    }

    #[test]
    fn test_name_errors_accumulate() {
        let v = Validator::with_limits(5, Duration::hours(24));
        let errors = validation_errors(v.validate_task_name("far too long#").map(|_| ()));
        assert!(errors.has("name", ValidationKind::InvalidLength));
        assert!(errors.has("name", ValidationKind::InvalidCharacter));
    }

    #[test]
    fn test_time_shorthand() {
        let v = Validator::new();

        assert!(v.validate_time_shorthand("2h").is_ok());
        for token in ["30m", "1h", "1d", "1w", "1mo", "1y", "12mo", "90m"] {
            assert!(v.is_valid_time_shorthand(token), "{} should be valid", token);
        }

        assert!(v.validate_time_shorthand("1h30m").is_err());
        assert!(v.validate_time_shorthand("0m").is_err());
        for token in ["", "h", "1.5h", "-1h", "1x", "1 h", "1H"] {
            assert!(!v.is_valid_time_shorthand(token), "{} should be invalid", token);
        }

        let errors = validation_errors(v.validate_time_shorthand(""));
        assert!(errors.has("range", ValidationKind::Required));
    }

    #[test]
    fn test_parse_shorthand_units() {
        assert_eq!(parse_shorthand("30m"), Some(Duration::minutes(30)));
        assert_eq!(parse_shorthand("2h"), Some(Duration::hours(2)));
        assert_eq!(parse_shorthand("1d"), Some(Duration::hours(24)));
        assert_eq!(parse_shorthand("2w"), Some(Duration::days(14)));
        assert_eq!(parse_shorthand("1mo"), Some(Duration::days(30)));
        assert_eq!(parse_shorthand("1y"), Some(Duration::days(365)));
        assert_eq!(parse_shorthand("0d"), None);
    }

    #[test]
    fn test_reasonable_dates() {
        let v = Validator::new();
        let now = Utc::now();

        assert!(v.is_reasonable_date(now));
        assert!(v.is_reasonable_date(now - Duration::days(365 * 9)));
        assert!(!v.is_reasonable_date(now - Duration::days(365 * 11)));
        assert!(!v.is_reasonable_date(now + Duration::days(400)));
    }

    #[test]
    fn test_durations_and_ids() {
        let v = Validator::new();

        assert!(v.is_valid_duration(Duration::minutes(1)));
        assert!(v.is_valid_duration(Duration::hours(24)));
        assert!(!v.is_valid_duration(Duration::zero()));
        assert!(!v.is_valid_duration(Duration::hours(24) + Duration::seconds(1)));

        assert!(v.is_valid_id(1));
        assert!(!v.is_valid_id(0));
        assert!(v.validate_id("task_id", -3).is_err());
    }

    #[test]
    fn test_entry_and_search_ranges_are_asymmetric() {
        let v = Validator::new();
        let now = Utc::now();

        let entry = NewTimeEntry {
            task_id: 1,
            start_time: now,
            end_time: Some(now),
        };
        let errors = validation_errors(v.validate_new_entry(&entry));
        assert!(errors.has("end_time", ValidationKind::InvalidRange));

        assert!(v.validate_search_range(Some(now), Some(now)).is_ok());
        assert!(v.validate_search_range(None, Some(now)).is_ok());
        assert!(v
            .validate_search_range(Some(now), Some(now - Duration::minutes(1)))
            .is_err());
    }

    #[test]
    fn test_entry_errors_accumulate() {
        let v = Validator::new();
        let now = Utc::now();

        let entry = NewTimeEntry {
            task_id: 0,
            start_time: now - Duration::hours(30),
            end_time: Some(now),
        };
        let errors = validation_errors(v.validate_new_entry(&entry));
        assert!(errors.has("task_id", ValidationKind::InvalidValue));
        assert!(errors.has("end_time", ValidationKind::InvalidRange));

        let running = NewTimeEntry::running(1, now);
        assert!(v.validate_new_entry(&running).is_ok());
    }

    #[test]
    fn test_validate_entry_uses_session_limit() {
        let now = Utc::now();
        let entry = TimeEntry {
            id: 0,
            task_id: 3,
            start_time: now - Duration::hours(5),
            end_time: Some(now),
        };

        let errors = validation_errors(Validator::new().validate_entry(&entry));
        assert!(errors.has("id", ValidationKind::InvalidValue));
        assert!(!errors.has("end_time", ValidationKind::InvalidRange));

        let strict = Validator::with_limits(DEFAULT_MAX_NAME_LENGTH, Duration::hours(4));
        let errors = validation_errors(strict.validate_entry(&TimeEntry { id: 1, ..entry }));
        assert_eq!(errors.errors().len(), 1);
        assert!(errors.has("end_time", ValidationKind::InvalidRange));
    }
}
