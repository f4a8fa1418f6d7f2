//! Application state wiring the engine to its concrete adapters.
//!
//! The engine is generic over repository, executor and notifier traits;
//! AppState pins it to the SQLite, reqwest and Rhai implementations.

use std::path::PathBuf;
use std::sync::Arc;

use cadence_core::engine::{Engine, EngineSettings};
use cadence_infra::action::ActionDispatcher;
use cadence_infra::config::{database_url, ensure_data_dir};
use cadence_infra::notify::WebhookFailureNotifier;
use cadence_infra::sqlite::{
    DatabasePool, SqliteExecutionLogRepository, SqliteJobRepository, SqliteWorkflowRepository,
};
use cadence_types::config::EngineConfig;

/// The engine pinned to infra implementations.
pub type ConcreteEngine = Engine<
    SqliteJobRepository,
    SqliteWorkflowRepository,
    SqliteExecutionLogRepository,
    ActionDispatcher,
    WebhookFailureNotifier,
>;

/// Shared application state, used by both CLI commands and HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConcreteEngine>,
    pub config: Arc<EngineConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Open the database under `data_dir` and wire the engine.
    pub async fn init(data_dir: PathBuf, config: EngineConfig) -> anyhow::Result<Self> {
        ensure_data_dir(&data_dir).await?;

        let db_url = database_url(&config, &data_dir);
        let pool = DatabasePool::new(&db_url).await?;
        tracing::debug!(data_dir = %data_dir.display(), "application state initialized");

        Self::with_pool(pool, config, data_dir)
    }

    pub fn with_pool(
        pool: DatabasePool,
        config: EngineConfig,
        data_dir: PathBuf,
    ) -> anyhow::Result<Self> {
        let actions = ActionDispatcher::new(&config)?;
        let notifier = WebhookFailureNotifier::new(actions.transport().client().clone());

        let engine = Engine::new(
            Arc::new(SqliteJobRepository::new(pool.clone())),
            Arc::new(SqliteWorkflowRepository::new(pool.clone())),
            Arc::new(SqliteExecutionLogRepository::new(pool)),
            Arc::new(actions),
            Arc::new(notifier),
            EngineSettings::from_config(&config),
        );

        Ok(Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
            data_dir,
        })
    }
}
