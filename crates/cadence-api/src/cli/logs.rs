//! `cadence logs`: recent execution log entries.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};

use cadence_types::execution::ExecutionLog;

use super::{parse_id, print_empty, status_cell};
use crate::state::AppState;

pub async fn show_logs(state: &AppState, job: Option<&str>, limit: u32, json: bool) -> Result<()> {
    let job_id = job.map(|raw| parse_id("job", raw)).transpose()?;
    let logs = state.engine.recent_logs(job_id.as_ref(), limit).await?;
    print_logs(&logs, json)
}

/// Print log entries as a table (or JSON).
pub fn print_logs(logs: &[ExecutionLog], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(logs)?);
        return Ok(());
    }
    if logs.is_empty() {
        print_empty("execution logs");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Started").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Status"),
            Cell::new("Duration"),
            Cell::new("Result"),
        ]);

    for log in logs {
        let duration = log
            .duration_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".to_string());
        let result = log
            .error
            .as_deref()
            .or(log.output.as_deref())
            .map(|text| truncate(text, 60))
            .unwrap_or_default();

        table.add_row(vec![
            Cell::new(log.started_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(&log.name),
            status_cell(&log.status.to_string()),
            Cell::new(duration),
            Cell::new(result),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let cut: String = single_line.chars().take(max_chars).collect();
    format!("{cut}…")
}
