//! Hosted auth provider (GoTrue-style REST API)

use super::provider::{
    AuthError, AuthProvider, Credentials, OAuthProvider, Profile, Session, SignUpOutcome, User,
};
use crate::hosted::{error_message, HostedClient, ServiceError};
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Token endpoint response; also the sign-up response when auto-confirm is on
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: Option<User>,
}

/// Wrong email or password; every other refusal keeps the service's message
/// ("Email not confirmed", rate limits, ...)
fn refusal(error: ServiceError) -> AuthError {
    let bad_credentials = error.has_code("invalid_credentials")
        || error.message.eq_ignore_ascii_case("Invalid login credentials");
    if bad_credentials {
        AuthError::InvalidCredentials
    } else {
        AuthError::Rejected(error.message)
    }
}

pub struct HostedAuth {
    client: HostedClient,
    redirect_url: String,
}

impl HostedAuth {
    pub fn new(client: HostedClient, redirect_url: impl Into<String>) -> Self {
        Self { client, redirect_url: redirect_url.into() }
    }

    fn session_from(token: TokenResponse) -> Option<Session> {
        let access_token = token.access_token?;
        let user = token.user?;
        let expires_at = token
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .or_else(|| token.expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)));

        Some(Session { user, access_token, refresh_token: token.refresh_token, expires_at })
    }
}

#[async_trait::async_trait]
impl AuthProvider for HostedAuth {
    fn name(&self) -> &'static str {
        "hosted"
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let url = self.client.auth_url("token?grant_type=password");
        let response = self
            .client
            .request(Method::POST, &url)
            .json(credentials)
            .send()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let error = ServiceError::from_response(response).await;
            debug!(status = status.as_u16(), code = ?error.code, message = %error.message, "Sign-in refused");
            return Err(refusal(error));
        }
        if !status.is_success() {
            return Err(AuthError::Backend(error_message(response).await));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Backend(format!("unreadable token response: {}", e)))?;
        let session = Self::session_from(token)
            .ok_or_else(|| AuthError::Backend("token response without session".to_string()))?;

        info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        profile: &Profile,
    ) -> Result<SignUpOutcome, AuthError> {
        let url = self.client.auth_url("signup");
        let body = json!({
            "email": credentials.email.trim(),
            "password": credentials.password,
            "data": {
                "first_name": profile.first_name.trim(),
                "last_name": profile.last_name.trim(),
            },
        });

        let response = self
            .client
            .request(Method::POST, &url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            return Err(AuthError::Rejected(error_message(response).await));
        }
        if !status.is_success() {
            return Err(AuthError::Backend(error_message(response).await));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Backend(format!("unreadable sign-up response: {}", e)))?;

        match Self::session_from(token) {
            Some(session) => {
                info!(user_id = %session.user.id, "Signed up");
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => {
                info!("Signed up; email confirmation pending");
                Ok(SignUpOutcome::ConfirmationPending { email: credentials.email.trim().to_string() })
            }
        }
    }

    fn authorize_url(&self, provider: &OAuthProvider) -> Result<String, AuthError> {
        let mut url = Url::parse(&self.client.auth_url("authorize"))
            .map_err(|e| AuthError::Backend(format!("invalid auth URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", &self.redirect_url);
        Ok(url.into())
    }

    async fn user_for_token(&self, access_token: &str) -> Result<User, AuthError> {
        let url = self.client.auth_url("user");
        let response = self
            .client
            .authorized(Method::GET, &url, access_token)
            .send()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::Backend(error_message(response).await));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Backend(format!("unreadable user response: {}", e)))
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        let url = self.client.auth_url("logout");
        let response = self
            .client
            .authorized(Method::POST, &url, &session.access_token)
            .send()
            .await
            .map_err(|e| AuthError::Backend(e.to_string()))?;

        let status = response.status();
        // An already-invalid token means the session is gone either way
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }

        let message = error_message(response).await;
        warn!(status = status.as_u16(), %message, "Sign-out failed");
        Err(AuthError::Backend(message))
    }
}
