//! Cadence CLI and trigger server entry point.
//!
//! Binary name: `cadence`
//!
//! Parses CLI arguments, loads configuration and the database, then either
//! runs a one-shot command or starts the scheduler together with the HTTP
//! trigger server.

mod cli;
mod http;
mod state;

use clap::Parser;

use cadence_infra::config::{load_config, resolve_data_dir};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.clone().unwrap_or_else(resolve_data_dir);
    let mut config = load_config(&data_dir).await;
    if let Some(level) = cli::verbosity_level(cli.verbose) {
        config.logging.level = level.to_string();
    }
    cadence_observe::init_tracing(&config.logging)?;

    let state = AppState::init(data_dir, config).await?;
    let result = dispatch(state, cli).await;

    cadence_observe::shutdown_tracing();
    result
}

async fn dispatch(state: AppState, cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port, host } => serve(state, host, port, cli.json).await?,
        Commands::Import { file } => cli::import::import_file(&state, &file, cli.json).await?,
        Commands::Job { action } => cli::job::handle(&state, action, cli.json).await?,
        Commands::Workflow { action } => cli::workflow::handle(&state, action, cli.json).await?,
        Commands::Logs { job, limit } => {
            cli::logs::show_logs(&state, job.as_deref(), limit, cli.json).await?;
        }
    }
    Ok(())
}

async fn serve(
    state: AppState,
    host: Option<String>,
    port: Option<u16>,
    json: bool,
) -> anyhow::Result<()> {
    let report = state.engine.start().await?;

    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "listening": format!("http://{addr}"),
                "jobsScheduled": report.jobs_scheduled,
                "workflowsScheduled": report.workflows_scheduled,
                "skipped": report.skipped,
            })
        );
    } else {
        println!();
        println!(
            "  {} Scheduled {} job(s) and {} workflow(s)",
            console::style("⏱").bold(),
            report.jobs_scheduled,
            report.workflows_scheduled
        );
        if report.skipped > 0 {
            println!(
                "  {} Skipped {} definition(s) with invalid schedules",
                console::style("!").yellow().bold(),
                report.skipped
            );
        }
        println!(
            "  {} Cadence listening on {}",
            console::style("⚡").bold(),
            console::style(format!("http://{addr}")).cyan()
        );
        println!("  {}", console::style("Press Ctrl+C to stop").dim());
    }

    let engine = state.engine.clone();
    let router = http::router::build_router(state);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    engine.shutdown().await?;
    served?;

    if !json {
        println!("\n  Server stopped.");
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
