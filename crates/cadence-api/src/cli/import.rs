//! `cadence import`: upsert job and workflow definitions from JSON.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use serde::{Deserialize, Serialize};

use cadence_types::job::Job;
use cadence_types::workflow::Workflow;

use crate::state::AppState;

/// Shape of an import file.
#[derive(Debug, Default, Deserialize)]
pub struct ImportDocument {
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub workflows: Vec<Workflow>,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub jobs: usize,
    pub workflows: usize,
}

/// Validate and save every definition in `doc`. Stops at the first invalid
/// definition; anything saved before it stays saved.
pub async fn import_document(state: &AppState, doc: ImportDocument) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for job in &doc.jobs {
        state
            .engine
            .save_job(job)
            .await
            .with_context(|| format!("job '{}'", job.name))?;
        summary.jobs += 1;
    }
    for workflow in &doc.workflows {
        state
            .engine
            .save_workflow(workflow)
            .await
            .with_context(|| format!("workflow '{}'", workflow.name))?;
        summary.workflows += 1;
    }

    tracing::info!(jobs = summary.jobs, workflows = summary.workflows, "definitions imported");
    Ok(summary)
}

pub async fn import_file(state: &AppState, path: &Path, json: bool) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let doc: ImportDocument = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a valid import document", path.display()))?;

    let summary = import_document(state, doc).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "  {} Imported {} job(s) and {} workflow(s)",
            style("✓").green().bold(),
            summary.jobs,
            summary.workflows
        );
    }
    Ok(())
}
