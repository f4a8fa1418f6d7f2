//! Shared domain types for Cadence.
//!
//! This crate contains the definitions the engine operates on: jobs, workflows
//! and their steps, action and authentication configuration, execution records,
//! notification templates, engine configuration, and repository errors.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod action;
pub mod config;
pub mod error;
pub mod execution;
pub mod job;
pub mod template;
pub mod workflow;
