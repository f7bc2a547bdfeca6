//! Session store
//!
//! Holds the current identity (or none) and runs the auth operations against
//! an injected [`AuthProvider`]. Dependents read the identity through
//! [`SessionStore::current`] or observe changes via [`SessionStore::subscribe`];
//! only the store itself ever writes it.

pub mod hosted;
pub mod local;
pub mod provider;
pub mod token_file;

pub use provider::{
    AuthError, AuthProvider, Credentials, OAuthProvider, Profile, Session, SignUpForm,
    SignUpOutcome, User,
};

use chrono::Utc;
use retiscan_common::events::{AppEvent, EventBus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Where the user must go to finish social sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRedirect {
    pub provider: OAuthProvider,
    pub url: String,
}

#[derive(Clone)]
pub struct SessionStore {
    provider: Arc<dyn AuthProvider>,
    current: Arc<watch::Sender<Option<Session>>>,
    events: EventBus,
    token_path: Option<PathBuf>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn AuthProvider>, events: EventBus) -> Self {
        let (tx, _) = watch::channel(None);
        Self { provider, current: Arc::new(tx), events, token_path: None }
    }

    /// Persist the session token at `path` across runs
    pub fn with_token_file(mut self, path: PathBuf) -> Self {
        self.token_path = Some(path);
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Snapshot of the current session
    pub fn current(&self) -> Option<Session> {
        self.current.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.current.borrow().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Observe session changes; the receiver starts at the current value
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.current.subscribe()
    }

    fn set(&self, session: Option<Session>) {
        let user_id = session.as_ref().map(|s| s.user.id.clone());

        if let Some(path) = &self.token_path {
            let result = match &session {
                Some(s) => token_file::save(path, s),
                None => token_file::remove(path),
            };
            if let Err(e) = result {
                warn!("Could not update session file {}: {}", path.display(), e);
            }
        }

        self.current.send_replace(session);
        self.events.emit(AppEvent::SessionChanged { user_id, timestamp: Utc::now() });
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        credentials.validate()?;
        let session = self.provider.sign_in(credentials).await?;
        self.set(Some(session.clone()));
        Ok(session)
    }

    /// Validates the form locally, then registers with the provider
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<SignUpOutcome, AuthError> {
        form.validate()?;
        let outcome = self.provider.sign_up(&form.credentials, &form.profile).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            self.set(Some(session.clone()));
        }
        Ok(outcome)
    }

    /// Start social sign-in; finish with [`Self::complete_provider_sign_in`]
    pub fn sign_in_with_provider(&self, provider: OAuthProvider) -> Result<ProviderRedirect, AuthError> {
        let url = self.provider.authorize_url(&provider)?;
        info!(%provider, "Social sign-in started");
        Ok(ProviderRedirect { provider, url })
    }

    /// Adopt the access token handed back by the identity provider
    pub async fn complete_provider_sign_in(
        &self,
        access_token: &str,
        refresh_token: Option<String>,
    ) -> Result<Session, AuthError> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(AuthError::InvalidInput("Access token is required".to_string()));
        }

        let user = self.provider.user_for_token(access_token).await?;
        let session = Session {
            user,
            access_token: access_token.to_string(),
            refresh_token,
            expires_at: None,
        };
        info!(user_id = %session.user.id, "Social sign-in completed");
        self.set(Some(session.clone()));
        Ok(session)
    }

    /// End the session
    ///
    /// The local session is dropped even when the provider call fails; the
    /// failure is still returned.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.current() else {
            debug!("Sign-out without a session");
            return Ok(());
        };

        let result = self.provider.sign_out(&session).await;
        self.set(None);
        info!(user_id = %session.user.id, "Signed out");
        result
    }

    /// Reload a saved session and check it is still accepted
    ///
    /// Returns `Ok(None)` when nothing usable was saved. A token the provider
    /// no longer accepts is discarded.
    pub async fn restore(&self) -> Result<Option<Session>, AuthError> {
        let Some(path) = &self.token_path else {
            return Ok(None);
        };

        let saved = match token_file::load(path) {
            Ok(Some(session)) => session,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        if saved.is_expired(Utc::now()) {
            info!("Saved session expired");
            self.set(None);
            return Ok(None);
        }

        match self.provider.user_for_token(&saved.access_token).await {
            Ok(user) => {
                let session = Session { user, ..saved };
                self.set(Some(session.clone()));
                Ok(Some(session))
            }
            Err(AuthError::InvalidCredentials) => {
                info!("Saved session no longer valid");
                self.set(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retiscan_common::db::init_memory_database;

    async fn local_store() -> SessionStore {
        let db = init_memory_database().await.unwrap();
        SessionStore::new(Arc::new(local::LocalAuth::new(db)), EventBus::new(10))
    }

    fn form() -> SignUpForm {
        SignUpForm {
            credentials: Credentials::new("ana@example.com", "secret1"),
            confirm_password: "secret1".to_string(),
            profile: Profile { first_name: "Ana".to_string(), last_name: "Silva".to_string() },
        }
    }

    #[tokio::test]
    async fn test_sign_up_sets_session_and_notifies() {
        let store = local_store().await;
        let mut rx = store.subscribe();
        assert!(rx.borrow().is_none());

        store.sign_up(&form()).await.unwrap();

        assert!(store.is_authenticated());
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_some());
    }

    #[tokio::test]
    async fn test_mismatched_confirmation_never_reaches_provider() {
        let store = local_store().await;
        let mut bad = form();
        bad.confirm_password = "different".to_string();

        assert!(matches!(store.sign_up(&bad).await, Err(AuthError::InvalidInput(_))));
        // Nothing was registered
        let result = store.sign_in(&Credentials::new("ana@example.com", "secret1")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let store = local_store().await;
        store.sign_up(&form()).await.unwrap();

        store.sign_out().await.unwrap();
        assert!(!store.is_authenticated());
        assert!(store.user().is_none());

        // Second sign-out is a no-op
        store.sign_out().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_sign_in_keeps_previous_state() {
        let store = local_store().await;
        store.sign_up(&form()).await.unwrap();
        let before = store.current();

        let result = store.sign_in(&Credentials::new("ana@example.com", "nope-nope")).await;
        assert!(result.is_err());
        assert_eq!(store.current(), before);
    }
}
