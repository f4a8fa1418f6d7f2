//! CLI workflow subcommands: list, run, executions, steps, pause, resume,
//! delete.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use cadence_core::repository::workflow::WorkflowRepository;
use cadence_types::execution::ExecutionStatus;
use cadence_types::workflow::WorkflowStatus;

use super::{parse_id, print_empty, short_id, status_cell};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// List all workflows.
    List,

    /// Run a workflow now and wait for it to finish.
    Run {
        /// Workflow id.
        id: String,

        /// JSON object to seed the run context with.
        #[arg(long)]
        payload: Option<String>,
    },

    /// Show recent executions of a workflow.
    Executions {
        /// Workflow id.
        id: String,

        #[arg(long, default_value = "10")]
        limit: u32,
    },

    /// Show the step logs of one execution.
    Steps {
        /// Execution id.
        execution_id: String,
    },

    /// Stop scheduling and triggering a workflow.
    Pause {
        id: String,
    },

    /// Re-activate a paused workflow.
    Resume {
        id: String,
    },

    /// Delete a workflow and its execution history.
    Delete {
        id: String,
    },
}

pub async fn handle(state: &AppState, command: WorkflowCommand, json: bool) -> Result<()> {
    match command {
        WorkflowCommand::List => list_workflows(state, json).await,
        WorkflowCommand::Run { id, payload } => run_workflow(state, &id, payload.as_deref(), json).await,
        WorkflowCommand::Executions { id, limit } => list_executions(state, &id, limit, json).await,
        WorkflowCommand::Steps { execution_id } => {
            let id = parse_id("execution", &execution_id)?;
            let logs = state.engine.execution_logs(&id).await?;
            super::logs::print_logs(&logs, json)
        }
        WorkflowCommand::Pause { id } => set_status(state, &id, WorkflowStatus::Paused, json).await,
        WorkflowCommand::Resume { id } => set_status(state, &id, WorkflowStatus::Active, json).await,
        WorkflowCommand::Delete { id } => delete_workflow(state, &id, json).await,
    }
}

async fn list_workflows(state: &AppState, json: bool) -> Result<()> {
    let workflows = state.engine.workflows().list_workflows().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workflows)?);
        return Ok(());
    }
    if workflows.is_empty() {
        print_empty("workflows");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Trigger"),
            Cell::new("Schedule"),
            Cell::new("Steps"),
            Cell::new("Status"),
        ]);

    for wf in &workflows {
        table.add_row(vec![
            Cell::new(short_id(&wf.id)),
            Cell::new(&wf.name),
            Cell::new(wf.trigger_type.to_string()),
            Cell::new(wf.cron_expression.as_deref().unwrap_or("-")),
            Cell::new(wf.steps.len()),
            status_cell(&wf.status.to_string()),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn run_workflow(state: &AppState, id: &str, payload: Option<&str>, json: bool) -> Result<()> {
    let id = parse_id("workflow", id)?;
    let payload = payload
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--payload must be valid JSON")?;

    let outcome = state.engine.run_workflow(&id, payload).await?;

    if json {
        let value = serde_json::json!({
            "executionId": outcome.execution_id,
            "status": outcome.status,
            "error": outcome.error,
            "stepsEntered": outcome.steps_entered,
            "context": outcome.context,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    match outcome.status {
        ExecutionStatus::Completed => println!(
            "  {} Execution {} completed ({} steps)",
            style("✓").green().bold(),
            style(short_id(&outcome.execution_id)).cyan(),
            outcome.steps_entered
        ),
        _ => println!(
            "  {} Execution {} {}: {}",
            style("✗").red().bold(),
            style(short_id(&outcome.execution_id)).cyan(),
            outcome.status,
            style(outcome.error.as_deref().unwrap_or("unknown error")).red()
        ),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&outcome.context)?);
    println!();
    Ok(())
}

async fn list_executions(state: &AppState, id: &str, limit: u32, json: bool) -> Result<()> {
    let id = parse_id("workflow", id)?;
    let executions = state.engine.executions(&id, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&executions)?);
        return Ok(());
    }
    if executions.is_empty() {
        print_empty("executions");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Execution").fg(Color::Cyan),
            Cell::new("Status"),
            Cell::new("Trigger"),
            Cell::new("Step"),
            Cell::new("Started"),
            Cell::new("Completed"),
            Cell::new("Error"),
        ]);

    for exec in &executions {
        let completed = exec
            .completed_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(exec.id.to_string()),
            status_cell(&exec.status.to_string()),
            Cell::new(exec.trigger_type.to_string()),
            Cell::new(exec.current_step.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string())),
            Cell::new(exec.started_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(completed),
            Cell::new(exec.error.as_deref().unwrap_or("")),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn set_status(state: &AppState, id: &str, status: WorkflowStatus, json: bool) -> Result<()> {
    let id = parse_id("workflow", id)?;
    let mut workflow = state
        .engine
        .workflows()
        .get_workflow(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("workflow {id} not found"))?;
    workflow.status = status;
    state.engine.save_workflow(&workflow).await?;

    if json {
        println!("{}", serde_json::json!({ "id": id, "status": status }));
    } else {
        println!(
            "  {} Workflow '{}' is now {}",
            style("✓").green().bold(),
            style(&workflow.name).cyan(),
            status
        );
    }
    Ok(())
}

async fn delete_workflow(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_id("workflow", id)?;
    let deleted = state.engine.delete_workflow(&id).await?;

    if json {
        println!("{}", serde_json::json!({ "id": id, "deleted": deleted }));
    } else if deleted {
        println!("  {} Workflow deleted", style("✓").green().bold());
    } else {
        println!("  {} No workflow with id {id}", style("!").yellow().bold());
    }
    Ok(())
}
