use chrono::Local;

use crate::models::TimeEntryWithTask;

/// Generate markdown export; times are shown in local time
pub fn generate(entries: &[TimeEntryWithTask]) -> String {
    let mut output = String::new();

    output.push_str("# Time Entries\n\n");

    if entries.is_empty() {
        output.push_str("_No entries._\n");
        return output;
    }

    output.push_str("| ID | Task | Start | End | Duration |\n");
    output.push_str("|----|------|-------|-----|----------|\n");

    for item in entries {
        let end = item
            .entry
            .end_time
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            item.entry.id,
            item.task_name,
            item.entry.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            end,
            item.duration
        ));
    }

    output
}
