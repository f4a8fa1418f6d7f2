//! CLI command definitions for the `cadence` binary.
//!
//! Uses clap derive macros. Resource commands follow a noun-verb pattern
//! (`cadence job run <id>`, `cadence workflow list`).

pub mod import;
pub mod job;
pub mod logs;
pub mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color};
use console::style;

/// Cron-driven jobs and multi-step workflows.
#[derive(Parser)]
#[command(name = "cadence", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Data directory holding config.toml and the database.
    #[arg(long, global = true, env = "CADENCE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the scheduler and the HTTP trigger server.
    Serve {
        /// Port to listen on (overrides config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config).
        #[arg(long)]
        host: Option<String>,
    },

    /// Import job and workflow definitions from a JSON file.
    Import {
        /// File of the form `{ "jobs": [...], "workflows": [...] }`.
        file: PathBuf,
    },

    /// Manage scheduled jobs.
    Job {
        #[command(subcommand)]
        action: job::JobCommand,
    },

    /// Manage workflows.
    #[command(alias = "wf")]
    Workflow {
        #[command(subcommand)]
        action: workflow::WorkflowCommand,
    },

    /// Show recent execution logs.
    Logs {
        /// Only logs of this job.
        #[arg(long)]
        job: Option<String>,

        /// Maximum number of entries.
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

/// Log filter directive for a `-v` count, if it should override the config.
pub fn verbosity_level(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info,cadence_core=debug,cadence_infra=debug,cadence=debug"),
        _ => Some("trace"),
    }
}

/// Parse a UUID argument with a readable error.
pub fn parse_id(kind: &str, raw: &str) -> anyhow::Result<uuid::Uuid> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("'{raw}' is not a valid {kind} id"))
}

pub(crate) fn status_cell(status: &str) -> Cell {
    let color = match status {
        "active" | "completed" | "success" => Color::Green,
        "running" => Color::Yellow,
        "failed" | "failure" => Color::Red,
        _ => Color::DarkGrey,
    };
    Cell::new(status).fg(color)
}

pub(crate) fn print_empty(what: &str) {
    println!();
    println!("  {}", style(format!("No {what} found.")).dim());
    println!();
}

pub(crate) fn short_id(id: &uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}
