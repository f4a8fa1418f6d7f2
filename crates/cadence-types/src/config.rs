//! Engine configuration types.
//!
//! `EngineConfig` represents the `config.toml` in the data directory. Every
//! field has a default, so an empty file (or no file) is a valid config.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Cadence engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite connection URL. Defaults to `cadence.db` inside the data dir.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub script: ScriptConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Outbound HTTP settings shared by http_request, webhook and OAuth2 calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("cadence/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

/// Resource limits for the script sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,
    #[serde(default = "default_script_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,
    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,
}

fn default_max_operations() -> u64 {
    1_000_000
}

fn default_script_timeout_secs() -> u64 {
    10
}

fn default_max_call_levels() -> usize {
    64
}

fn default_max_string_size() -> usize {
    1024 * 1024
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            timeout_secs: default_script_timeout_secs(),
            max_call_levels: default_max_call_levels(),
            max_string_size: default_max_string_size(),
        }
    }
}

/// Workflow interpreter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Upper bound on steps entered by a single run, including re-entries
    /// caused by backward jumps.
    #[serde(default = "default_max_step_visits")]
    pub max_step_visits: u32,
}

fn default_max_step_visits() -> u32 {
    1000
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_step_visits: default_max_step_visits(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Export spans through OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            otel: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Settings for the job failure notification hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Rich template rendered with `job`, `error` and `failedAt`.
    #[serde(default = "default_failure_template")]
    pub failure_template: String,
}

fn default_failure_template() -> String {
    "Job \"{{job.name}}\" failed at {{failedAt}}: {{error}}".to_string()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            failure_template: default_failure_template(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert!(config.database_url.is_none());
        assert_eq!(config.http.request_timeout_secs, 30);
        assert_eq!(config.script.max_operations, 1_000_000);
        assert_eq!(config.workflow.max_step_visits, 1000);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_engine_config_deserialize_empty() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.script.timeout_secs, 10);
        assert_eq!(config.script.max_call_levels, 64);
        assert!(config.http.user_agent.starts_with("cadence/"));
        assert!(config.notifications.failure_template.contains("{{error}}"));
    }

    #[test]
    fn test_engine_config_deserialize_partial_sections() {
        let toml_str = r#"
database_url = "sqlite:///tmp/cadence-test.db"

[http]
request_timeout_secs = 5

[workflow]
max_step_visits = 50

[logging]
level = "debug"
format = "json"
otel = true

[server]
port = 8080
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("sqlite:///tmp/cadence-test.db")
        );
        assert_eq!(config.http.request_timeout_secs, 5);
        assert!(config.http.user_agent.starts_with("cadence/"));
        assert_eq!(config.workflow.max_step_visits, 50);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.logging.otel);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
    }
}
