//! `{{dot.path}}` placeholder interpolation for action fields.
//!
//! Templates are compiled once into literal and placeholder segments and
//! cached by source text. A placeholder whose path does not fully resolve is
//! emitted verbatim, so unresolved tokens can reach the network layer.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use regex::Regex;
use serde_json::Value;

use crate::context::lookup;

/// Compiled templates kept before the cache is reset.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)*)\}\}").expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder { token: String, path: String },
}

/// A template split into literal text and placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    segments: Vec<Segment>,
}

impl CompiledTemplate {
    pub fn compile(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(source) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Placeholder {
                token: whole.as_str().to_string(),
                path: path.as_str().to_string(),
            });
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Literal(source[last..].to_string()));
        }

        Self { segments }
    }

    /// Number of placeholders in the template.
    pub fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Placeholder { .. }))
            .count()
    }

    pub fn render(&self, context: &Value) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { token, path } => match lookup(context, path) {
                    Some(value) => out.push_str(&stringify(value)),
                    None => out.push_str(token),
                },
            }
        }
        out
    }
}

/// Strings are inserted raw; everything else as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interpolator with a compiled-template cache.
pub struct Interpolator {
    cache: DashMap<String, Arc<CompiledTemplate>>,
    capacity: usize,
}

impl Interpolator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: DashMap::new(),
            capacity,
        }
    }

    /// Resolve every `{{path}}` in `template` against `context`.
    pub fn interpolate(&self, template: &str, context: &Value) -> String {
        if !template.contains("{{") {
            return template.to_string();
        }
        self.compiled(template).render(context)
    }

    fn compiled(&self, template: &str) -> Arc<CompiledTemplate> {
        if let Some(hit) = self.cache.get(template) {
            return Arc::clone(hit.value());
        }

        let compiled = Arc::new(CompiledTemplate::compile(template));
        if self.cache.len() >= self.capacity {
            tracing::debug!(capacity = self.capacity, "template cache full, resetting");
            self.cache.clear();
        }
        self.cache
            .insert(template.to_string(), Arc::clone(&compiled));
        compiled
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED: LazyLock<Interpolator> = LazyLock::new(Interpolator::new);

/// Interpolate using the process-wide cached interpolator.
pub fn interpolate(template: &str, context: &Value) -> String {
    SHARED.interpolate(template, context)
}
