//! Authentication for `http_request` actions.
//!
//! An [`AuthConfig`] is first resolved into [`Credentials`] (which, for
//! OAuth2 client credentials, means a token exchange) and then applied to
//! the outgoing request.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cadence_core::action::ActionError;
use cadence_types::action::{ApiKeyLocation, AuthConfig};
use reqwest::RequestBuilder;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use super::http::HttpTransport;

/// Resolved credentials, ready to attach to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    None,
    /// Pre-encoded `Authorization: Basic` value.
    Basic(String),
    Bearer(String),
    Header { name: String, value: String },
    Query { name: String, value: String },
}

impl Credentials {
    pub fn apply_to_request(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Credentials::None => request,
            Credentials::Basic(encoded) => request.header(AUTHORIZATION, format!("Basic {encoded}")),
            Credentials::Bearer(token) => request.bearer_auth(token),
            Credentials::Header { name, value } => request.header(name.as_str(), value.as_str()),
            Credentials::Query { name, value } => request.query(&[(name.as_str(), value.as_str())]),
        }
    }
}

/// Resolve `auth` and attach it to `request`.
pub async fn apply(
    transport: &HttpTransport,
    request: RequestBuilder,
    auth: &AuthConfig,
) -> Result<RequestBuilder, ActionError> {
    let credentials = resolve(transport, auth).await?;
    Ok(credentials.apply_to_request(request))
}

pub async fn resolve(transport: &HttpTransport, auth: &AuthConfig) -> Result<Credentials, ActionError> {
    match auth {
        AuthConfig::None => Ok(Credentials::None),
        AuthConfig::Basic { username, password } => {
            Ok(Credentials::Basic(STANDARD.encode(format!("{username}:{password}"))))
        }
        AuthConfig::Bearer { token } => Ok(Credentials::Bearer(token.clone())),
        AuthConfig::ApiKey { key, value, add_to } => Ok(match add_to {
            ApiKeyLocation::Header => Credentials::Header {
                name: key.clone(),
                value: value.clone(),
            },
            ApiKeyLocation::Query => Credentials::Query {
                name: key.clone(),
                value: value.clone(),
            },
        }),
        AuthConfig::OAuth2ClientCredentials {
            client_id,
            client_secret,
            token_url,
            scope,
        } => {
            let token = fetch_client_credentials_token(
                transport,
                token_url,
                client_id,
                client_secret,
                scope.as_deref(),
            )
            .await?;
            Ok(Credentials::Bearer(token))
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Exchange client credentials for an access token. Never cached: every call
/// hits the token endpoint.
pub async fn fetch_client_credentials_token(
    transport: &HttpTransport,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    scope: Option<&str>,
) -> Result<String, ActionError> {
    let mut form = vec![
        ("grant_type", "client_credentials"),
        ("client_id", client_id),
        ("client_secret", client_secret),
    ];
    if let Some(scope) = scope {
        form.push(("scope", scope));
    }

    tracing::debug!(token_url, client_id, "requesting OAuth2 client-credentials token");
    let response = transport
        .client()
        .post(token_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| transport.transport_error(e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport.transport_error(e))?;

    if !status.is_success() {
        tracing::warn!(token_url, status = status.as_u16(), "OAuth2 token exchange rejected");
        return Err(ActionError::TokenExchange {
            status: status.as_u16(),
            body,
        });
    }

    let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| ActionError::TokenExchange {
        status: status.as_u16(),
        body: format!("unreadable token response ({e}): {body}"),
    })?;

    match parsed.access_token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(ActionError::TokenExchange {
            status: status.as_u16(),
            body: format!("response has no access_token: {body}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_types::config::HttpConfig;
    use mockito::Matcher;

    fn transport() -> HttpTransport {
        HttpTransport::new(&HttpConfig::default()).unwrap()
    }

    fn oauth(token_url: String, scope: Option<&str>) -> AuthConfig {
        AuthConfig::OAuth2ClientCredentials {
            client_id: "abc".to_string(),
            client_secret: "shh".to_string(),
            token_url,
            scope: scope.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn basic_is_base64_of_user_and_password() {
        let creds = resolve(
            &transport(),
            &AuthConfig::Basic {
                username: "user".to_string(),
                password: "pass".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(creds, Credentials::Basic("dXNlcjpwYXNz".to_string()));
    }

    #[tokio::test]
    async fn api_key_location_decides_placement() {
        let header = resolve(
            &transport(),
            &AuthConfig::ApiKey {
                key: "X-Api-Key".to_string(),
                value: "k".to_string(),
                add_to: ApiKeyLocation::Header,
            },
        )
        .await
        .unwrap();
        assert!(matches!(header, Credentials::Header { .. }));

        let query = resolve(
            &transport(),
            &AuthConfig::ApiKey {
                key: "api_key".to_string(),
                value: "k".to_string(),
                add_to: ApiKeyLocation::Query,
            },
        )
        .await
        .unwrap();
        assert!(matches!(query, Credentials::Query { .. }));
    }

    #[tokio::test]
    async fn basic_header_reaches_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_header("authorization", "Basic dXNlcjpwYXNz")
            .with_status(200)
            .create_async()
            .await;

        let t = transport();
        let request = apply(
            &t,
            t.client().get(server.url()),
            &AuthConfig::Basic {
                username: "user".to_string(),
                password: "pass".to_string(),
            },
        )
        .await
        .unwrap();
        request.send().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_key_in_query_is_appended() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/data")
            .match_query(Matcher::UrlEncoded("api_key".into(), "k1".into()))
            .with_status(200)
            .create_async()
            .await;

        let t = transport();
        let request = apply(
            &t,
            t.client().get(format!("{}/data", server.url())),
            &AuthConfig::ApiKey {
                key: "api_key".to_string(),
                value: "k1".to_string(),
                add_to: ApiKeyLocation::Query,
            },
        )
        .await
        .unwrap();
        request.send().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn oauth2_posts_form_and_uses_token() {
        let mut server = mockito::Server::new_async().await;
        let token_mock = server
            .mock("POST", "/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
                Matcher::UrlEncoded("client_id".into(), "abc".into()),
                Matcher::UrlEncoded("client_secret".into(), "shh".into()),
                Matcher::UrlEncoded("scope".into(), "read".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"tok-1","token_type":"bearer"}"#)
            .create_async()
            .await;
        let api_mock = server
            .mock("GET", "/protected")
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .create_async()
            .await;

        let t = transport();
        let request = apply(
            &t,
            t.client().get(format!("{}/protected", server.url())),
            &oauth(format!("{}/token", server.url()), Some("read")),
        )
        .await
        .unwrap();
        request.send().await.unwrap();

        token_mock.assert_async().await;
        api_mock.assert_async().await;
    }

    #[tokio::test]
    async fn oauth2_rejection_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(401)
            .with_body(r#"{"error":"invalid_client"}"#)
            .create_async()
            .await;

        let err = resolve(&transport(), &oauth(format!("{}/token", server.url()), None))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("invalid_client"));
    }

    #[tokio::test]
    async fn oauth2_without_access_token_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"token_type":"bearer"}"#)
            .create_async()
            .await;

        let err = resolve(&transport(), &oauth(format!("{}/token", server.url()), None))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::TokenExchange { status: 200, .. }));
    }

    #[tokio::test]
    async fn oauth2_fetches_a_fresh_token_every_time() {
        let mut server = mockito::Server::new_async().await;
        let token_mock = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"tok"}"#)
            .expect(2)
            .create_async()
            .await;

        let t = transport();
        let auth = oauth(format!("{}/token", server.url()), None);
        resolve(&t, &auth).await.unwrap();
        resolve(&t, &auth).await.unwrap();
        token_mock.assert_async().await;
    }
}
