//! Outbound HTTP for `http_request` and `webhook` actions.

use std::collections::HashMap;
use std::time::Duration;

use cadence_core::action::ActionError;
use cadence_types::action::{AuthConfig, HttpMethod};
use cadence_types::config::HttpConfig;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use super::auth;

const JSON: &str = "application/json";

/// Shared reqwest client plus the timeout it was built with.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout_secs: u64,
}

/// A fully interpolated `http_request`.
#[derive(Debug, Clone)]
pub struct OutboundRequest<'a> {
    pub method: HttpMethod,
    pub url: String,
    pub headers: &'a HashMap<String, String>,
    pub body: Option<String>,
    pub auth: &'a AuthConfig,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, ActionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ActionError::InvalidConfig(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Map a reqwest failure, distinguishing timeouts.
    pub fn transport_error(&self, err: reqwest::Error) -> ActionError {
        if err.is_timeout() {
            ActionError::Timeout(self.timeout_secs)
        } else {
            ActionError::Transport(err.to_string())
        }
    }

    /// Send an `http_request` action. A 2xx body is returned verbatim.
    pub async fn send(&self, request: OutboundRequest<'_>) -> Result<String, ActionError> {
        let headers = build_headers(request.headers)?;
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url)
            .headers(headers);

        builder = auth::apply(self, builder, request.auth).await?;

        if request.method.carries_body() {
            if let Some(body) = request.body {
                builder = builder.body(body);
            }
        }

        tracing::debug!(method = %request.method, url = request.url.as_str(), "sending http_request action");
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        read_success_body(self, response).await
    }

    /// POST a webhook payload. Returns a message naming the response status.
    pub async fn post_webhook(&self, url: &str, payload: String) -> Result<String, ActionError> {
        tracing::debug!(url, "posting webhook action");
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, JSON)
            .body(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        read_success_body(self, response).await?;
        Ok(format!("Webhook delivered: HTTP {}", status.as_u16()))
    }
}

/// The response body on 2xx, else `ActionError::Http` with status and body.
async fn read_success_body(
    transport: &HttpTransport,
    response: reqwest::Response,
) -> Result<String, ActionError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport.transport_error(e))?;
    if !status.is_success() {
        return Err(ActionError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

/// `Content-Type: application/json` overlaid with the user's headers.
fn build_headers(user: &HashMap<String, String>) -> Result<HeaderMap, ActionError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    for (name, value) in user {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ActionError::InvalidConfig(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ActionError::InvalidConfig(format!("invalid value for header '{name}': {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}
