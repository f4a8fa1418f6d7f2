//! Notification template definitions for the rich rendering mode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A notification template with declared variables.
///
/// Bodies may use `{{name}}`, `{{#each items}}...{{/each}}` and
/// `{{#if flag}}...{{else}}...{{/if}}` blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationTemplate {
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
}

/// A declared template variable with an optional default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
}

impl NotificationTemplate {
    /// Declared defaults, keyed by variable name.
    pub fn defaults(&self) -> HashMap<&str, &serde_json::Value> {
        self.variables
            .iter()
            .filter_map(|v| v.default_value.as_ref().map(|d| (v.name.as_str(), d)))
            .collect()
    }
}
