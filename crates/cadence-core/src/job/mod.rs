//! Standalone scheduled jobs.

pub mod notifier;
pub mod runner;

pub use notifier::{FailureNotifier, JobFailure, NotifyError};
pub use runner::{JobRunError, JobRunReport, JobRunner};
