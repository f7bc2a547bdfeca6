//! Persistence client for `predictions` records
//!
//! Every call carries the caller's session. Owner scoping is the backing
//! store's job: the hosted store relies on row-level security, the local
//! store adds `user_id = ?` to every statement.

pub mod hosted;
pub mod local;

pub use hosted::HostedStore;
pub use local::LocalStore;

use crate::session::Session;
use retiscan_common::{NewPrediction, Prediction, PredictionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Prediction {0} not found")]
    NotFound(PredictionId),

    /// Session rejected by the store
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Record does not belong to the session's user
    #[error("Record owner does not match the signed-in user")]
    OwnerMismatch,

    #[error("Store error: {0}")]
    Backend(String),

    /// Row could not be mapped onto a prediction record
    #[error("Malformed record: {0}")]
    Decode(String),
}

#[async_trait::async_trait]
pub trait PredictionStore: Send + Sync {
    /// The session's records, newest first
    async fn list_by_owner(&self, session: &Session) -> Result<Vec<Prediction>, StoreError>;

    async fn get_by_id(&self, session: &Session, id: &PredictionId) -> Result<Prediction, StoreError>;

    /// One atomic insert; returns the stored row with `id` and `created_at`
    async fn insert(&self, session: &Session, record: &NewPrediction) -> Result<Prediction, StoreError>;

    /// Irreversible; `NotFound` when nothing matched
    async fn delete_by_id(&self, session: &Session, id: &PredictionId) -> Result<(), StoreError>;
}

/// Refuse inserts on behalf of another user before touching the store
pub(crate) fn check_owner(session: &Session, record: &NewPrediction) -> Result<(), StoreError> {
    if record.owner != session.user.id {
        return Err(StoreError::OwnerMismatch);
    }
    Ok(())
}
