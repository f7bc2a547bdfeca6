//! History and detail views over the caller's saved predictions

use crate::persistence::{PredictionStore, StoreError};
use crate::session::{Session, SessionStore};
use chrono::{DateTime, Local, TimeZone};
use retiscan_common::events::{EventBus, Notice, Route};
use retiscan_common::{ConfidenceBand, DrClass, Prediction, PredictionId, DR_CLASSES};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Please log in to view your history")]
    AuthRequired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One summary row of the history list
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: PredictionId,
    /// e.g. `Jun 14, 2024`
    pub date: String,
    /// e.g. `14:30`
    pub time: String,
    pub class: DrClass,
    pub confidence: f64,
    pub band: ConfidenceBand,
}

impl HistoryEntry {
    pub fn from_prediction<Tz: TimeZone>(prediction: &Prediction, tz: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let local = prediction.created_at.with_timezone(tz);
        Self {
            id: prediction.id.clone(),
            date: local.format("%b %-d, %Y").to_string(),
            time: local.format("%H:%M").to_string(),
            class: prediction.class,
            confidence: prediction.confidence(),
            band: prediction.band(),
        }
    }
}

/// Counts shown above the list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total: usize,
    pub normal: usize,
    pub abnormal: usize,
}

impl HistoryStats {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        let abnormal = entries.iter().filter(|e| e.class.is_abnormal()).count();
        Self { total: entries.len(), normal: entries.len() - abnormal, abnormal }
    }
}

/// One line of the per-class breakdown
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassRow {
    pub class: DrClass,
    pub confidence: f64,
    pub predicted: bool,
}

/// Full record plus its class breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionDetail {
    pub record: Prediction,
    pub rows: Vec<ClassRow>,
}

impl PredictionDetail {
    pub fn new(record: Prediction) -> Self {
        let rows = DR_CLASSES
            .iter()
            .map(|&class| ClassRow {
                class,
                confidence: record.confidence_scores.get(class),
                predicted: class == record.class,
            })
            .collect();
        Self { record, rows }
    }

    pub fn created_local(&self) -> DateTime<Local> {
        self.record.created_at.with_timezone(&Local)
    }
}

pub struct HistoryView {
    session: SessionStore,
    store: Arc<dyn PredictionStore>,
    events: EventBus,
}

impl HistoryView {
    pub fn new(session: SessionStore, store: Arc<dyn PredictionStore>, events: EventBus) -> Self {
        Self { session, store, events }
    }

    fn require_session(&self) -> Result<Session, HistoryError> {
        self.session.current().ok_or_else(|| {
            info!("History blocked without a session; redirecting to login");
            self.events
                .notify(Notice::error("Authentication Required", "Please log in to view your history"));
            self.events.navigate(Route::Login);
            HistoryError::AuthRequired
        })
    }

    /// Newest first, timestamps in the local time zone
    pub async fn list(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let session = self.require_session()?;
        let records = self.store.list_by_owner(&session).await.map_err(|e| {
            warn!(error = %e, "Loading history failed");
            self.events.notify(Notice::error("Error", "Failed to load prediction history"));
            e
        })?;

        Ok(records.iter().map(|p| HistoryEntry::from_prediction(p, &Local)).collect())
    }

    pub async fn detail(&self, id: &PredictionId) -> Result<PredictionDetail, HistoryError> {
        let session = self.require_session()?;
        match self.store.get_by_id(&session, id).await {
            Ok(record) => Ok(PredictionDetail::new(record)),
            Err(e) => {
                warn!(record_id = %id, error = %e, "Loading prediction failed");
                let message = match e {
                    StoreError::NotFound(_) => "Prediction not found",
                    _ => "Failed to load prediction",
                };
                self.events.notify(Notice::error("Error", message));
                Err(e.into())
            }
        }
    }

    /// Irreversible; the caller confirms first
    pub async fn delete(&self, id: &PredictionId) -> Result<(), HistoryError> {
        let session = self.require_session()?;
        match self.store.delete_by_id(&session, id).await {
            Ok(()) => {
                info!(record_id = %id, "Removed from history");
                self.events.notify(Notice::success("Deleted", "Prediction deleted"));
                Ok(())
            }
            Err(e) => {
                warn!(record_id = %id, error = %e, "Deleting prediction failed");
                self.events.notify(Notice::error("Error", "Failed to delete prediction"));
                Err(e.into())
            }
        }
    }
}
