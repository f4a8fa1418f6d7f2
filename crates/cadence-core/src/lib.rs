//! Engine logic and repository trait definitions for Cadence.
//!
//! This crate defines the "ports" (repository, action executor and notifier
//! traits) that the infrastructure layer implements, plus everything that
//! drives them: interpolation, condition evaluation, the workflow step
//! interpreter, the job runner and the cron scheduler. It depends only on
//! `cadence-types` -- never on `cadence-infra` or any database/IO crate.

pub mod action;
pub mod condition;
pub mod context;
pub mod engine;
pub mod job;
pub mod ledger;
pub mod repository;
pub mod schedule;
pub mod template;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
