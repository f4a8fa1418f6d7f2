//! Observability setup for Cadence: structured logging and optional
//! OpenTelemetry span export.

pub mod tracing_setup;

pub use tracing_setup::{ObserveError, init_tracing, shutdown_tracing};
