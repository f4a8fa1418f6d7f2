//! Rich template rendering for notification content.
//!
//! Supports everything plain interpolation does, plus block helpers:
//!
//! ```text
//! {{#each orders}}{{@index}}: {{this.id}}{{/each}}
//! {{#if vip}}Welcome back{{else}}Hello{{/if}}
//! ```
//!
//! Blocks are rewritten into minijinja syntax and rendered there. Rendering
//! never fails the caller: a malformed template comes back unchanged.

use std::sync::LazyLock;

use cadence_types::template::NotificationTemplate;
use minijinja::{Environment, UndefinedBehavior};
use regex::Regex;
use serde_json::{Map, Value};

/// Errors from the rich template renderer.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template syntax error: {0}")]
    Syntax(String),

    #[error("template render error: {0}")]
    Render(String),
}

static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(#each|#if|/each|/if|else|@index)\s*([\w.]*)\s*\}\}")
        .expect("block pattern is valid")
});

/// Rewrite block helpers into minijinja tags.
fn translate(source: &str) -> String {
    BLOCK
        .replace_all(source, |caps: &regex::Captures<'_>| {
            let arg = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            match caps.get(1).map(|m| m.as_str()) {
                Some("#each") => format!("{{% for this in {arg} %}}"),
                Some("/each") => "{% endfor %}".to_string(),
                Some("#if") => format!("{{% if {arg} %}}"),
                Some("/if") => "{% endif %}".to_string(),
                Some("else") => "{% else %}".to_string(),
                Some("@index") => "{{ loop.index0 }}".to_string(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Overlay declared defaults for variables that are missing or null.
pub fn apply_defaults(template: &NotificationTemplate, vars: &Value) -> Value {
    let mut merged = match vars {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for (name, default) in template.defaults() {
        let missing = merged.get(name).is_none_or(Value::is_null);
        if missing {
            merged.insert(name.to_string(), default.clone());
        }
    }
    Value::Object(merged)
}

/// Render, reporting syntax and evaluation errors.
pub fn try_render(source: &str, vars: &Value) -> Result<String, TemplateError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Chainable);

    let translated = translate(source);
    let template = env
        .template_from_str(&translated)
        .map_err(|e| TemplateError::Syntax(e.to_string()))?;
    template
        .render(minijinja::Value::from_serialize(vars))
        .map_err(|e| TemplateError::Render(e.to_string()))
}

/// Render, falling back to the raw input on any error.
pub fn render(source: &str, vars: &Value) -> String {
    match try_render(source, vars) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::warn!(error = %e, "template render failed, using raw input");
            source.to_string()
        }
    }
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNotification {
    pub subject: String,
    pub body: String,
}

/// Render a notification template's subject and body with its defaults applied.
pub fn render_notification(template: &NotificationTemplate, vars: &Value) -> RenderedNotification {
    let vars = apply_defaults(template, vars);
    RenderedNotification {
        subject: render(&template.subject, &vars),
        body: render(&template.body, &vars),
    }
}
