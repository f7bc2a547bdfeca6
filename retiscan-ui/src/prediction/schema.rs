//! Wire schema of the `/predict` endpoint and its boundary validation
//!
//! Response fields are optional here only so that a missing field can be
//! reported by name; [`PredictResponse::validate`] turns the raw body into a
//! [`PredictionResult`] or rejects it.

use retiscan_common::{ConfidenceScores, DrClass};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct PredictRequest<'a> {
    pub image: &'a str,
}

/// Raw response body
#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    pub prediction_class: Option<i64>,
    pub confidence_scores: Option<BTreeMap<String, f64>>,
    /// Older services report only the top-class probability
    pub confidence: Option<f64>,
    pub explanation: Option<String>,
    pub gradcam_image: Option<String>,
}

/// Validated analysis outcome
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub class: DrClass,
    pub confidence_scores: ConfidenceScores,
    pub explanation: String,
    pub attention_map_image: String,
}

impl PredictionResult {
    /// Probability of the predicted class
    pub fn confidence(&self) -> f64 {
        self.confidence_scores.get(self.class)
    }
}

impl PredictResponse {
    /// Enforce the schema
    ///
    /// - `prediction_class` must index the 5-entry class table
    /// - `confidence_scores` keys must be class indices and values in [0,1];
    ///   absent classes read as 0.0
    /// - without `confidence_scores`, a scalar `confidence` is accepted as the
    ///   predicted class's score
    /// - `explanation` and `gradcam_image` must be present; the image must be
    ///   non-empty
    pub fn validate(self) -> Result<PredictionResult, String> {
        let raw_class = self.prediction_class.ok_or("missing prediction_class")?;
        let class = DrClass::from_index(raw_class)
            .ok_or_else(|| format!("prediction_class {} outside 0..=4", raw_class))?;

        let confidence_scores = match (self.confidence_scores, self.confidence) {
            (Some(map), _) => ConfidenceScores::try_from(map).map_err(|e| e.to_string())?,
            (None, Some(value)) => ConfidenceScores::single(class, value).map_err(|e| e.to_string())?,
            (None, None) => return Err("missing confidence_scores".to_string()),
        };

        let explanation = self.explanation.ok_or("missing explanation")?;
        let attention_map_image = self
            .gradcam_image
            .filter(|s| !s.trim().is_empty())
            .ok_or("missing gradcam_image")?;

        Ok(PredictionResult { class, confidence_scores, explanation, attention_map_image })
    }
}
