use anyhow::Result;
use std::io::Write;

use crate::models::TimeEntryWithTask;

/// Generate CSV export
pub fn generate<W: Write>(entries: &[TimeEntryWithTask], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(["entry_id", "task_id", "task", "start_time", "end_time", "duration"])?;

    for item in entries {
        let end_time = item
            .entry
            .end_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();

        wtr.write_record([
            &item.entry.id.to_string(),
            &item.entry.task_id.to_string(),
            &item.task_name,
            &item.entry.start_time.to_rfc3339(),
            &end_time,
            &item.duration,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Generate CSV export as string
pub fn generate_string(entries: &[TimeEntryWithTask]) -> Result<String> {
    let mut buffer = Vec::new();
    generate(entries, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
