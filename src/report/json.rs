use anyhow::Result;

use crate::models::TimeEntryWithTask;

/// Generate JSON export
pub fn generate(entries: &[TimeEntryWithTask]) -> Result<String> {
    let json = serde_json::to_string_pretty(entries)?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeEntry;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_generate_json() {
        let start = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
        let entries = vec![TimeEntryWithTask {
            entry: TimeEntry {
                id: 3,
                task_id: 1,
                start_time: start,
                end_time: Some(start + chrono::Duration::minutes(90)),
            },
            task_name: "Write report".to_string(),
            duration: "1h 30m".to_string(),
        }];

        let json = generate(&entries).unwrap();
        assert!(json.contains("\"task_name\": \"Write report\""));
        assert!(json.contains("\"duration\": \"1h 30m\""));
        assert!(json.contains("\"start_time\": \"2025-01-15T09:00:00Z\""));
    }
}
