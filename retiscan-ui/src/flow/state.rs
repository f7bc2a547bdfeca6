//! Upload flow state
//!
//! One tagged union; each variant owns exactly the data that is valid in it,
//! so "complete but no result" or "saving without analysis" cannot be built.

use crate::image::ImagePayload;
use crate::prediction::PredictionResult;
use retiscan_common::{FlowPhase, PredictionId};

#[derive(Debug, Clone, Default)]
pub enum FlowState {
    #[default]
    Idle,
    ImageSelected {
        image: ImagePayload,
    },
    Analyzing {
        image: ImagePayload,
    },
    AnalysisComplete {
        image: ImagePayload,
        result: PredictionResult,
    },
    Saving {
        image: ImagePayload,
        result: PredictionResult,
    },
    Saved {
        image: ImagePayload,
        result: PredictionResult,
        id: PredictionId,
    },
    /// Last analysis failed; the image is kept so it can be retried as is
    Error {
        image: ImagePayload,
        reason: String,
    },
}

impl FlowState {
    pub fn phase(&self) -> FlowPhase {
        match self {
            FlowState::Idle => FlowPhase::Idle,
            FlowState::ImageSelected { .. } => FlowPhase::ImageSelected,
            FlowState::Analyzing { .. } => FlowPhase::Analyzing,
            FlowState::AnalysisComplete { .. } => FlowPhase::AnalysisComplete,
            FlowState::Saving { .. } => FlowPhase::Saving,
            FlowState::Saved { .. } => FlowPhase::Saved,
            FlowState::Error { .. } => FlowPhase::Error,
        }
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        match self {
            FlowState::Idle => None,
            FlowState::ImageSelected { image }
            | FlowState::Analyzing { image }
            | FlowState::AnalysisComplete { image, .. }
            | FlowState::Saving { image, .. }
            | FlowState::Saved { image, .. }
            | FlowState::Error { image, .. } => Some(image),
        }
    }

    /// Result on display, if any
    pub fn result(&self) -> Option<&PredictionResult> {
        match self {
            FlowState::AnalysisComplete { result, .. }
            | FlowState::Saving { result, .. }
            | FlowState::Saved { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FlowState::Error { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// A network call is outstanding
    pub fn is_busy(&self) -> bool {
        matches!(self, FlowState::Analyzing { .. } | FlowState::Saving { .. })
    }
}
