//! Prediction record model
//!
//! Field names on the wire follow the `predictions` table columns
//! (`user_id`, `image_url`, `gradcam_url`, `ai_explanation`, ...).

use crate::classes::{ConfidenceBand, DrClass, DR_CLASSES};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Store-assigned record identifier
///
/// Opaque: hosted stores hand out UUIDs, but nothing here depends on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionId(String);

impl PredictionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PredictionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PredictionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Per-class confidence, class index → probability in [0,1]
///
/// Serialized as a JSON object keyed by the class index as a string
/// (`{"0": 0.05, "1": 0.15, ...}`). No sum-to-one invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ConfidenceScores(BTreeMap<u8, f64>);

impl ConfidenceScores {
    /// Build from `(class index, probability)` pairs
    ///
    /// Classes missing from `pairs` are filled with 0.0. Fails on an index
    /// outside the class table or a value outside [0,1].
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (i64, f64)>,
    {
        let mut scores: BTreeMap<u8, f64> = DR_CLASSES.iter().map(|c| (c.index(), 0.0)).collect();
        for (index, value) in pairs {
            let class = DrClass::from_index(index).ok_or_else(|| {
                Error::InvalidInput(format!("confidence score for unknown class {}", index))
            })?;
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidInput(format!(
                    "confidence {} for class {} outside [0,1]",
                    value, index
                )));
            }
            scores.insert(class.index(), value);
        }
        Ok(Self(scores))
    }

    /// Map holding `probability` for `class` and 0.0 everywhere else
    pub fn single(class: DrClass, probability: f64) -> Result<Self> {
        Self::from_pairs([(i64::from(class.index()), probability)])
    }

    pub fn get(&self, class: DrClass) -> f64 {
        self.0.get(&class.index()).copied().unwrap_or(0.0)
    }

    /// `(class, probability)` in class-table order
    pub fn iter(&self) -> impl Iterator<Item = (DrClass, f64)> + '_ {
        DR_CLASSES.iter().map(move |c| (*c, self.get(*c)))
    }

    /// Highest-scoring class; earliest class wins ties
    pub fn top(&self) -> Option<(DrClass, f64)> {
        self.iter()
            .fold(None, |best: Option<(DrClass, f64)>, (class, value)| match best {
                Some((_, best_value)) if best_value >= value => best,
                _ => Some((class, value)),
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<BTreeMap<String, f64>> for ConfidenceScores {
    type Error = Error;

    fn try_from(raw: BTreeMap<String, f64>) -> Result<Self> {
        let mut pairs = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            let index = key.trim().parse::<i64>().map_err(|_| {
                Error::InvalidInput(format!("confidence key '{}' is not a class index", key))
            })?;
            pairs.push((index, value));
        }
        Self::from_pairs(pairs)
    }
}

impl From<ConfidenceScores> for BTreeMap<String, f64> {
    fn from(scores: ConfidenceScores) -> Self {
        scores.0.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }
}

/// A persisted prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: PredictionId,
    #[serde(rename = "user_id")]
    pub owner: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "prediction_class")]
    pub class: DrClass,
    pub confidence_scores: ConfidenceScores,
    #[serde(rename = "image_url")]
    pub source_image: String,
    #[serde(rename = "gradcam_url")]
    pub attention_map_image: String,
    #[serde(rename = "ai_explanation")]
    pub explanation: String,
}

impl Prediction {
    /// The caller-supplied part of the record, without store-assigned fields
    pub fn content(&self) -> NewPrediction {
        NewPrediction {
            owner: self.owner.clone(),
            class: self.class,
            confidence_scores: self.confidence_scores.clone(),
            source_image: self.source_image.clone(),
            attention_map_image: self.attention_map_image.clone(),
            explanation: self.explanation.clone(),
        }
    }

    /// Confidence of the predicted class
    pub fn confidence(&self) -> f64 {
        self.confidence_scores.get(self.class)
    }

    pub fn band(&self) -> ConfidenceBand {
        ConfidenceBand::for_probability(self.confidence())
    }
}

/// A complete record ready for one atomic insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    #[serde(rename = "user_id")]
    pub owner: String,
    #[serde(rename = "prediction_class")]
    pub class: DrClass,
    pub confidence_scores: ConfidenceScores,
    #[serde(rename = "image_url")]
    pub source_image: String,
    #[serde(rename = "gradcam_url")]
    pub attention_map_image: String,
    #[serde(rename = "ai_explanation")]
    pub explanation: String,
}

/// Percent string with two decimals, e.g. `65.00%`
pub fn format_percent(probability: f64) -> String {
    format!("{:.2}%", probability * 100.0)
}
