//! Failure notification adapters.

pub mod webhook;

pub use webhook::WebhookFailureNotifier;
