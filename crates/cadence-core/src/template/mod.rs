//! Template handling: plain `{{dot.path}}` interpolation for action fields,
//! and the richer block-aware renderer for notification content.

pub mod interpolate;
pub mod render;

pub use interpolate::{Interpolator, interpolate};
pub use render::{TemplateError, render};
