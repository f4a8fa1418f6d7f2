//! Infrastructure layer for Cadence.
//!
//! Contains implementations of the ports defined in `cadence-core`: SQLite
//! storage, the action executor (reqwest for HTTP and webhooks, Rhai for
//! scripts), the webhook failure notifier, and the config file loader.

pub mod action;
pub mod config;
pub mod notify;
pub mod sqlite;
