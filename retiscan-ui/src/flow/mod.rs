//! Upload/analyze flow controller
//!
//! Coordinates one upload session:
//! `Idle → ImageSelected → Analyzing → AnalysisComplete → Saving → Saved`,
//! with `Error` reachable from `Analyzing`.
//!
//! # Concurrency
//!
//! Operations take `&self` and may be called from several tasks. The state
//! lock is never held across a network call. Each call records the epoch it
//! started in; [`UploadController::reset`] bumps the epoch, so a response that
//! arrives after the user navigated away is dropped without touching state.
//! A second analysis while one is in flight (or a second save) is ignored,
//! not queued.

pub mod reveal;
pub mod state;

pub use state::FlowState;

use crate::image::{ImageError, ImagePayload};
use crate::persistence::{PredictionStore, StoreError};
use crate::prediction::{PredictionError, PredictionResult, Predictor};
use crate::session::{Session, SessionStore};
use chrono::Utc;
use futures::stream::Stream;
use retiscan_common::events::{AppEvent, EventBus, Notice, Route};
use retiscan_common::{FlowPhase, NewPrediction, Prediction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FlowError {
    /// No session; the front end was sent to the login screen
    #[error("Please log in to continue")]
    AuthRequired,

    /// A network call is outstanding
    #[error("Another operation is in progress")]
    Busy,

    #[error("Cannot {operation} while {phase:?}")]
    InvalidTransition { operation: &'static str, phase: FlowPhase },

    #[error(transparent)]
    InvalidImage(#[from] ImageError),

    #[error(transparent)]
    AnalysisFailed(#[from] PredictionError),

    #[error("Failed to save prediction: {0}")]
    SaveFailed(#[from] StoreError),
}

/// How a `start_analysis` call ended
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Complete(PredictionResult),
    /// An analysis was already in flight
    Ignored,
    /// The controller was reset while waiting; the response was dropped
    Discarded,
}

/// How a `save` call ended
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(Prediction),
    /// A save was already in flight
    Ignored,
    /// The controller was reset while waiting; the response was dropped
    Discarded,
}

struct Inner {
    state: FlowState,
    epoch: u64,
}

pub struct UploadController {
    inner: Mutex<Inner>,
    session: SessionStore,
    predictor: Arc<dyn Predictor>,
    store: Arc<dyn PredictionStore>,
    events: EventBus,
    max_image_bytes: u64,
}

impl UploadController {
    pub fn new(
        session: SessionStore,
        predictor: Arc<dyn Predictor>,
        store: Arc<dyn PredictionStore>,
        events: EventBus,
        max_image_bytes: u64,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner { state: FlowState::Idle, epoch: 0 }),
            session,
            predictor,
            store,
            events,
            max_image_bytes,
        }
    }

    // Critical sections never panic, so a poisoned lock still holds a valid state
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current state
    pub fn state(&self) -> FlowState {
        self.lock().state.clone()
    }

    pub fn phase(&self) -> FlowPhase {
        self.lock().state.phase()
    }

    fn transition(&self, inner: &mut Inner, new_state: FlowState) {
        let old_phase = inner.state.phase();
        let new_phase = new_state.phase();
        inner.state = new_state;

        debug!(?old_phase, ?new_phase, "Upload flow transition");
        self.events.emit(AppEvent::FlowPhaseChanged { old_phase, new_phase, timestamp: Utc::now() });
    }

    fn require_session(&self, title: &str, message: &str) -> Result<Session, FlowError> {
        match self.session.current() {
            Some(session) => Ok(session),
            None => {
                info!("Blocked without a session; redirecting to login");
                self.events.notify(Notice::error(title, message));
                self.events.navigate(Route::Login);
                Err(FlowError::AuthRequired)
            }
        }
    }

    /// Accept an encoded image, dropping any previous result
    pub fn select_image(&self, image: ImagePayload) -> Result<(), FlowError> {
        let mut inner = self.lock();
        if inner.state.is_busy() {
            return Err(FlowError::Busy);
        }

        info!(file = image.file_name().unwrap_or("<unnamed>"), bytes = image.byte_len(), "Image selected");
        inner.epoch += 1;
        self.transition(&mut inner, FlowState::ImageSelected { image });
        Ok(())
    }

    /// Read, check and encode a file, then select it
    ///
    /// A rejected file leaves the current state untouched.
    pub async fn select_file(&self, path: &Path) -> Result<(), FlowError> {
        match ImagePayload::from_path(path, self.max_image_bytes).await {
            Ok(image) => self.select_image(image),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Image rejected");
                self.events.notify(Notice::error("Invalid Image", e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Submit the selected image for analysis
    ///
    /// Allowed from `ImageSelected` and `Error`; the latter retries with the
    /// image already held.
    pub async fn start_analysis(&self) -> Result<AnalysisOutcome, FlowError> {
        let (image, epoch) = {
            let mut inner = self.lock();
            let image = match &inner.state {
                FlowState::Analyzing { .. } => return Ok(AnalysisOutcome::Ignored),
                FlowState::ImageSelected { image } | FlowState::Error { image, .. } => image.clone(),
                other => {
                    return Err(FlowError::InvalidTransition {
                        operation: "start analysis",
                        phase: other.phase(),
                    })
                }
            };

            // Checked after the state so a missing image never redirects
            self.require_session("Authentication Required", "Please log in to analyze images")?;

            let epoch = inner.epoch;
            self.transition(&mut inner, FlowState::Analyzing { image: image.clone() });
            (image, epoch)
        };

        let response = self.predictor.submit(&image).await;

        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!("Discarding analysis response from a previous upload session");
            return Ok(AnalysisOutcome::Discarded);
        }

        match response {
            Ok(result) => {
                self.transition(
                    &mut inner,
                    FlowState::AnalysisComplete { image, result: result.clone() },
                );
                Ok(AnalysisOutcome::Complete(result))
            }
            Err(e) => {
                warn!(cause = ?e.cause, detail = %e.detail, "Analysis failed");
                self.transition(&mut inner, FlowState::Error { image, reason: e.to_string() });
                drop(inner);
                self.events.notify(Notice::error(
                    "Analysis Failed",
                    "Could not analyze the image. Please try again.",
                ));
                Err(FlowError::AnalysisFailed(e))
            }
        }
    }

    /// Persist the displayed result as one complete record
    ///
    /// On success the front end is sent to the new record's detail view. On
    /// failure the result stays on display and nothing was written.
    pub async fn save(&self) -> Result<SaveOutcome, FlowError> {
        let (image, result, epoch, session) = {
            let mut inner = self.lock();
            let (image, result) = match &inner.state {
                FlowState::Saving { .. } => return Ok(SaveOutcome::Ignored),
                FlowState::AnalysisComplete { image, result } => (image.clone(), result.clone()),
                other => {
                    return Err(FlowError::InvalidTransition { operation: "save", phase: other.phase() })
                }
            };

            let session = self.require_session("Error", "Please log in to save predictions")?;

            let epoch = inner.epoch;
            self.transition(
                &mut inner,
                FlowState::Saving { image: image.clone(), result: result.clone() },
            );
            (image, result, epoch, session)
        };

        let record = NewPrediction {
            owner: session.user.id.clone(),
            class: result.class,
            confidence_scores: result.confidence_scores.clone(),
            source_image: image.data_url().to_string(),
            attention_map_image: result.attention_map_image.clone(),
            explanation: result.explanation.clone(),
        };

        let response = self.store.insert(&session, &record).await;

        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!("Discarding save response from a previous upload session");
            return Ok(SaveOutcome::Discarded);
        }

        match response {
            Ok(saved) => {
                self.transition(
                    &mut inner,
                    FlowState::Saved { image, result, id: saved.id.clone() },
                );
                drop(inner);
                self.events.notify(Notice::success("Success", "Prediction saved successfully!"));
                self.events.navigate(Route::PredictionDetail(saved.id.clone()));
                Ok(SaveOutcome::Saved(saved))
            }
            Err(e) => {
                warn!(error = %e, "Saving prediction failed");
                self.transition(&mut inner, FlowState::AnalysisComplete { image, result });
                drop(inner);
                self.events.notify(Notice::error("Error", "Failed to save prediction"));
                Err(FlowError::SaveFailed(e))
            }
        }
    }

    /// Navigate away: back to `Idle`, dropping any in-flight response
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        if !matches!(inner.state, FlowState::Idle) {
            self.transition(&mut inner, FlowState::Idle);
        }
    }

    /// Typewriter frames of the current explanation, if a result is shown
    pub fn reveal_explanation(&self, interval: Duration) -> Option<impl Stream<Item = String>> {
        let text = self.lock().state.result()?.explanation.clone();
        Some(reveal::reveal(text, interval))
    }
}
