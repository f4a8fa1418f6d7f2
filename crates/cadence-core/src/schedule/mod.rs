//! Cron triggers for jobs and workflows.

pub mod scheduler;

pub use scheduler::{
    CronCallback, CronScheduler, SchedulerError, TriggerKey, next_run, normalize_schedule,
};
