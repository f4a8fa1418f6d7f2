//! CLI job subcommands: list, run, pause, resume, delete.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use cadence_core::repository::job::JobRepository;
use cadence_types::execution::LogOutcome;
use cadence_types::job::JobStatus;

use super::{parse_id, print_empty, short_id, status_cell};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum JobCommand {
    /// List all jobs.
    List,

    /// Run a job once, now.
    Run {
        /// Job id.
        id: String,
    },

    /// Stop scheduling a job.
    Pause {
        id: String,
    },

    /// Resume scheduling a paused job.
    Resume {
        id: String,
    },

    /// Delete a job.
    Delete {
        id: String,
    },
}

pub async fn handle(state: &AppState, command: JobCommand, json: bool) -> Result<()> {
    match command {
        JobCommand::List => list_jobs(state, json).await,
        JobCommand::Run { id } => run_job(state, &id, json).await,
        JobCommand::Pause { id } => set_status(state, &id, JobStatus::Paused, json).await,
        JobCommand::Resume { id } => set_status(state, &id, JobStatus::Active, json).await,
        JobCommand::Delete { id } => delete_job(state, &id, json).await,
    }
}

async fn list_jobs(state: &AppState, json: bool) -> Result<()> {
    let jobs = state.engine.jobs().list_jobs().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }
    if jobs.is_empty() {
        print_empty("jobs");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Schedule"),
            Cell::new("Action"),
            Cell::new("Status"),
            Cell::new("Last run"),
            Cell::new("Next run"),
        ]);

    for job in &jobs {
        let fmt_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        table.add_row(vec![
            Cell::new(short_id(&job.id)),
            Cell::new(&job.name),
            Cell::new(&job.cron_expression),
            Cell::new(job.action.kind()),
            status_cell(&job.status.to_string()),
            Cell::new(fmt_time(job.last_run)),
            Cell::new(fmt_time(job.next_run)),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn run_job(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_id("job", id)?;
    let report = state.engine.run_job_now(&id).await?;

    if json {
        let (status, output, error) = match &report.outcome {
            LogOutcome::Success(out) => ("success", Some(out.as_str()), None),
            LogOutcome::Failure(err) => ("failure", None, Some(err.as_str())),
        };
        let value = serde_json::json!({
            "jobId": report.job_id,
            "logId": report.log_id,
            "status": status,
            "output": output,
            "error": error,
            "durationMs": report.duration_ms,
            "nextRun": report.next_run,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    match &report.outcome {
        LogOutcome::Success(output) => {
            println!(
                "  {} Job succeeded in {}ms",
                style("✓").green().bold(),
                report.duration_ms
            );
            println!();
            println!("{output}");
        }
        LogOutcome::Failure(error) => {
            println!(
                "  {} Job failed after {}ms: {}",
                style("✗").red().bold(),
                report.duration_ms,
                style(error).red()
            );
        }
    }
    println!();
    Ok(())
}

async fn set_status(state: &AppState, id: &str, status: JobStatus, json: bool) -> Result<()> {
    let id = parse_id("job", id)?;
    let mut job = state
        .engine
        .jobs()
        .get_job(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("job {id} not found"))?;
    job.status = status;
    let saved = state.engine.save_job(&job).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        println!(
            "  {} Job '{}' is now {}",
            style("✓").green().bold(),
            style(&saved.name).cyan(),
            saved.status
        );
    }
    Ok(())
}

async fn delete_job(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_id("job", id)?;
    let deleted = state.engine.delete_job(&id).await?;

    if json {
        println!("{}", serde_json::json!({ "id": id, "deleted": deleted }));
    } else if deleted {
        println!("  {} Job deleted", style("✓").green().bold());
    } else {
        println!("  {} No job with id {id}", style("!").yellow().bold());
    }
    Ok(())
}
