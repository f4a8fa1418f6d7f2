//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (cadence-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod execution_log;
pub mod job;
pub mod workflow;

/// Default page size for list queries.
pub const DEFAULT_LIST_LIMIT: u32 = 50;
