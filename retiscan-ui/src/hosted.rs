//! Shared HTTP plumbing for the hosted backend (auth + REST data API)

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("retiscan/", env!("CARGO_PKG_VERSION"));

/// Connection to one hosted project
#[derive(Debug, Clone)]
pub struct HostedClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl HostedClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `<base>/auth/v1/<path>`
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `<base>/rest/v1/<table>`
    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Request carrying the project API key
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url).header("apikey", &self.anon_key)
    }

    /// Request carrying the project API key and a user's bearer token
    pub fn authorized(&self, method: Method, url: &str, access_token: &str) -> RequestBuilder {
        self.request(method, url).bearer_auth(access_token)
    }
}

/// Error body shapes returned by the auth and REST services
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
    /// Auth service: `invalid_credentials`, `email_not_confirmed`, ...
    error_code: Option<String>,
    /// REST service: Postgres SQLSTATE (`22P02`, `42501`, ...); an integer
    /// status on the auth service
    code: Option<serde_json::Value>,
}

/// Decoded failure response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub status: StatusCode,
    /// Machine-readable code, if the service sent one
    pub code: Option<String>,
    pub message: String,
}

impl ServiceError {
    pub async fn from_response(response: Response) -> Self {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        Self::parse(status, &text)
    }

    fn parse(status: StatusCode, text: &str) -> Self {
        let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();

        let code = body.error_code.or_else(|| match body.code {
            Some(serde_json::Value::String(code)) => Some(code),
            _ => None,
        });
        let message = body
            .error_description
            .or(body.msg)
            .or(body.message)
            .or(body.error)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                if text.trim().is_empty() {
                    format!("HTTP {}", status.as_u16())
                } else {
                    format!("HTTP {}: {}", status.as_u16(), text.trim())
                }
            });

        Self { status, code, message }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

/// Best human-readable message from a failed response
pub async fn error_message(response: Response) -> String {
    ServiceError::from_response(response).await.message
}
