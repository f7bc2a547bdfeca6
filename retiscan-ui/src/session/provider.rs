//! Auth provider seam and the session value types it trades in

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Minimum password length accepted at sign-up
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Rejected before any network call (empty field, mismatched confirmation, ...)
    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// Provider refused the request with its own message
    #[error("{0}")]
    Rejected(String),

    /// Operation not offered by this provider
    #[error("{0} is not supported by this backend")]
    Unsupported(String),

    /// Transport failure or unexpected response
    #[error("Auth service error: {0}")]
    Backend(String),
}

/// Authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// An established session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Email/password pair
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }

    /// Field checks shared by sign-in and sign-up
    pub fn validate(&self) -> Result<(), AuthError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(AuthError::InvalidInput("Email is required".to_string()));
        }
        if !email.contains('@') {
            return Err(AuthError::InvalidInput(format!("'{}' is not an email address", email)));
        }
        if self.password.is_empty() {
            return Err(AuthError::InvalidInput("Password is required".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Name fields collected at sign-up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
}

/// Everything the sign-up form collects
#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub credentials: Credentials,
    pub confirm_password: String,
    pub profile: Profile,
}

impl SignUpForm {
    /// Input errors are caught here, before any network call
    pub fn validate(&self) -> Result<(), AuthError> {
        self.credentials.validate()?;
        if self.credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.credentials.password != self.confirm_password {
            return Err(AuthError::InvalidInput("Passwords do not match".to_string()));
        }
        if self.profile.first_name.trim().is_empty() || self.profile.last_name.trim().is_empty() {
            return Err(AuthError::InvalidInput("First and last name are required".to_string()));
        }
        Ok(())
    }
}

/// What a successful sign-up produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    /// Account created; the provider wants the email confirmed first
    ConfirmationPending { email: String },
}

/// Third-party identity provider for social sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
    Other(String),
}

impl OAuthProvider {
    pub fn as_str(&self) -> &str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
            OAuthProvider::Other(name) => name,
        }
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "" => Err(AuthError::InvalidInput("Provider name is required".to_string())),
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            _ => Ok(OAuthProvider::Other(name)),
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backing identity service
///
/// Implementations perform exactly one round trip per call: no retries,
/// no backoff.
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    async fn sign_up(
        &self,
        credentials: &Credentials,
        profile: &Profile,
    ) -> Result<SignUpOutcome, AuthError>;

    /// URL the user must visit to sign in with `provider`
    fn authorize_url(&self, provider: &OAuthProvider) -> Result<String, AuthError>;

    /// Resolve the user behind an access token
    async fn user_for_token(&self, access_token: &str) -> Result<User, AuthError>;

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError>;
}
