//! HTTP trigger surface for Cadence.
//!
//! Axum-based: public webhook receiver, manual workflow runs under
//! `/api/v1/`, and a health check.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
