//! Local auth provider backed by the SQLite `users` and `sessions` tables
//!
//! Stands in for the hosted identity service when running offline.
//! Passwords are stored as hex SHA-256 of `salt || password` with a random
//! per-user salt.

use super::provider::{
    AuthError, AuthProvider, Credentials, OAuthProvider, Profile, Session, SignUpOutcome, User,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

pub struct LocalAuth {
    db: SqlitePool,
}

impl LocalAuth {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn issue_session(&self, user: User) -> Result<Session, AuthError> {
        let token = random_hex(32);
        sqlx::query("INSERT INTO sessions (token, user_id) VALUES (?, ?)")
            .bind(&token)
            .bind(&user.id)
            .execute(&self.db)
            .await
            .map_err(db_error)?;

        Ok(Session { user, access_token: token, refresh_token: None, expires_at: None })
    }
}

fn db_error(e: sqlx::Error) -> AuthError {
    AuthError::Backend(e.to_string())
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{:02x}", b)).collect()
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait::async_trait]
impl AuthProvider for LocalAuth {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let row: Option<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, email, password_hash, password_salt FROM users WHERE email = ?",
        )
        .bind(credentials.email.trim())
        .fetch_optional(&self.db)
        .await
        .map_err(db_error)?;

        let (id, email, stored_hash, salt) = row.ok_or(AuthError::InvalidCredentials)?;
        if hash_password(&salt, &credentials.password) != stored_hash {
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %id, "Signed in (local)");
        self.issue_session(User { id, email: Some(email) }).await
    }

    async fn sign_up(
        &self,
        credentials: &Credentials,
        profile: &Profile,
    ) -> Result<SignUpOutcome, AuthError> {
        let email = credentials.email.trim();
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .map_err(db_error)?;
        if existing.is_some() {
            return Err(AuthError::Rejected("User already registered".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let salt = random_hex(16);
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, password_salt, first_name, last_name)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(email)
        .bind(hash_password(&salt, &credentials.password))
        .bind(&salt)
        .bind(profile.first_name.trim())
        .bind(profile.last_name.trim())
        .execute(&self.db)
        .await
        .map_err(db_error)?;

        info!(user_id = %id, "Signed up (local)");
        let session = self.issue_session(User { id, email: Some(email.to_string()) }).await?;
        Ok(SignUpOutcome::SignedIn(session))
    }

    fn authorize_url(&self, _provider: &OAuthProvider) -> Result<String, AuthError> {
        Err(AuthError::Unsupported("Social sign-in".to_string()))
    }

    async fn user_for_token(&self, access_token: &str) -> Result<User, AuthError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT u.id, u.email FROM sessions s JOIN users u ON u.id = s.user_id WHERE s.token = ?",
        )
        .bind(access_token)
        .fetch_optional(&self.db)
        .await
        .map_err(db_error)?;

        row.map(|(id, email)| User { id, email: Some(email) })
            .ok_or(AuthError::InvalidCredentials)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), AuthError> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(&session.access_token)
            .execute(&self.db)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
