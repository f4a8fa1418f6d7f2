//! Action and authentication configuration.
//!
//! An action is the unit of side-effecting work: an HTTP request, a webhook
//! post, or a sandboxed script. Every string field may carry `{{dot.path}}`
//! placeholders, which are resolved against the execution context when the
//! action runs, never when it is defined.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ActionConfig
// ---------------------------------------------------------------------------

/// The work performed by a job or by an action step.
///
/// Internally tagged by `type`:
/// ```json
/// { "type": "http_request", "url": "https://api.example.com/users", "method": "POST" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ActionConfig {
    /// Issue an HTTP request; the 2xx response body is the result.
    HttpRequest {
        url: String,
        #[serde(default)]
        method: HttpMethod,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        headers: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default)]
        auth: AuthConfig,
    },
    /// POST a JSON payload to a URL.
    Webhook {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
    /// Run a script in the embedded sandbox.
    Script {
        code: String,
        #[serde(default)]
        language: ScriptLanguage,
    },
}

impl ActionConfig {
    /// Short kind name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionConfig::HttpRequest { .. } => "http_request",
            ActionConfig::Webhook { .. } => "webhook",
            ActionConfig::Script { .. } => "script",
        }
    }
}

/// HTTP method for `http_request` actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Whether a request body is attached for this method.
    pub fn carries_body(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scripting language for `script` actions. Only the embedded Rhai engine is
/// available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptLanguage {
    #[default]
    Rhai,
}

// ---------------------------------------------------------------------------
// AuthConfig
// ---------------------------------------------------------------------------

/// Authentication strategy attached to an `http_request` action.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AuthConfig {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Bearer {
        token: String,
    },
    ApiKey {
        key: String,
        value: String,
        #[serde(default)]
        add_to: ApiKeyLocation,
    },
    /// Exchange client credentials for an access token before every request.
    #[serde(rename = "oauth2_client_credentials")]
    OAuth2ClientCredentials {
        client_id: String,
        client_secret: String,
        token_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
    },
}

/// Where an API key is placed on the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn http_request_parses_with_defaults() {
        let action: ActionConfig = serde_json::from_value(json!({
            "type": "http_request",
            "url": "https://example.com/{{user.id}}"
        }))
        .unwrap();

        match action {
            ActionConfig::HttpRequest {
                method,
                headers,
                body,
                auth,
                ..
            } => {
                assert_eq!(method, HttpMethod::Get);
                assert!(headers.is_empty());
                assert!(body.is_none());
                assert_eq!(auth, AuthConfig::None);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn oauth2_auth_uses_camel_case_fields() {
        let auth: AuthConfig = serde_json::from_value(json!({
            "type": "oauth2_client_credentials",
            "clientId": "abc",
            "clientSecret": "shh",
            "tokenUrl": "https://auth.example.com/token",
            "scope": "read"
        }))
        .unwrap();

        assert_eq!(
            auth,
            AuthConfig::OAuth2ClientCredentials {
                client_id: "abc".to_string(),
                client_secret: "shh".to_string(),
                token_url: "https://auth.example.com/token".to_string(),
                scope: Some("read".to_string()),
            }
        );
    }

    #[test]
    fn api_key_defaults_to_header() {
        let auth: AuthConfig = serde_json::from_value(json!({
            "type": "api_key",
            "key": "X-Api-Key",
            "value": "secret"
        }))
        .unwrap();
        assert!(matches!(
            auth,
            AuthConfig::ApiKey {
                add_to: ApiKeyLocation::Header,
                ..
            }
        ));
    }

    #[test]
    fn script_language_defaults_to_rhai() {
        let action: ActionConfig =
            serde_json::from_value(json!({ "type": "script", "code": "40 + 2" })).unwrap();
        assert_eq!(action.kind(), "script");
        assert!(matches!(
            action,
            ActionConfig::Script {
                language: ScriptLanguage::Rhai,
                ..
            }
        ));
    }

    #[test]
    fn get_never_carries_body() {
        assert!(!HttpMethod::Get.carries_body());
        assert!(HttpMethod::Post.carries_body());
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }
}
