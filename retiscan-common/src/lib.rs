//! # Retiscan Common Library
//!
//! Shared code for the Retiscan screening client including:
//! - Prediction record model and the fixed DR class table
//! - Configuration loading (CLI > environment > TOML > defaults)
//! - Local SQLite database initialization
//! - Notice/navigation event bus
//! - Error types

pub mod classes;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;

pub use classes::{ConfidenceBand, DrClass, DR_CLASSES};
pub use error::{Error, Result};
pub use events::{AppEvent, EventBus, FlowPhase, Notice, NoticeLevel, Route};
pub use models::{ConfidenceScores, NewPrediction, Prediction, PredictionId};
