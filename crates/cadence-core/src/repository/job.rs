//! Job repository trait definition.

use cadence_types::error::RepositoryError;
use cadence_types::job::Job;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository trait for job definitions.
///
/// Implementations live in cadence-infra (e.g., SqliteJobRepository).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait JobRepository: Send + Sync {
    /// All jobs with status `active`, the set rescheduled at startup.
    fn list_active_jobs(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Job>, RepositoryError>> + Send;

    /// All jobs regardless of status, ordered by name.
    fn list_jobs(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Job>, RepositoryError>> + Send;

    /// Get a job by its UUID.
    fn get_job(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Job>, RepositoryError>> + Send;

    /// Insert or update a job. Updating an existing job bumps its `version`.
    /// Returns the job as stored.
    fn save_job(
        &self,
        job: &Job,
    ) -> impl std::future::Future<Output = Result<Job, RepositoryError>> + Send;

    /// Delete a job by ID. Returns `true` if it existed.
    fn delete_job(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Record run bookkeeping without touching the definition or its version.
    fn update_run_times(
        &self,
        id: &Uuid,
        last_run: Option<DateTime<Utc>>,
        next_run: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
