//! # Retiscan client library
//!
//! Diabetic retinopathy screening client:
//! - Session store over a hosted (GoTrue-style) or local SQLite auth provider
//! - Prediction client for the remote `/predict` classifier
//! - Persistence client for saved `predictions` records
//! - Upload/analyze flow controller
//! - History and detail view models

pub mod app;
pub mod flow;
pub mod history;
pub mod hosted;
pub mod image;
pub mod persistence;
pub mod prediction;
pub mod render;
pub mod session;

pub use app::Services;
pub use flow::{AnalysisOutcome, FlowError, FlowState, SaveOutcome, UploadController};
pub use history::{HistoryEntry, HistoryView, PredictionDetail};
pub use image::ImagePayload;
pub use persistence::{PredictionStore, StoreError};
pub use prediction::{HttpPredictionClient, PredictionError, PredictionResult, Predictor};
pub use session::{Session, SessionStore};
