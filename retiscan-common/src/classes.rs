//! Fixed diabetic retinopathy class table
//!
//! Five severity stages, ordered. The model service reports a class as an
//! integer index into this table; anything outside 0..=4 is not a class.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of severity classes reported by the prediction service
pub const CLASS_COUNT: usize = 5;

/// DR severity stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DrClass {
    NoDr,
    Mild,
    Moderate,
    Severe,
    Proliferative,
}

/// Class table in index order
pub const DR_CLASSES: [DrClass; CLASS_COUNT] = [
    DrClass::NoDr,
    DrClass::Mild,
    DrClass::Moderate,
    DrClass::Severe,
    DrClass::Proliferative,
];

impl DrClass {
    /// Look up a class by its service index
    pub fn from_index(index: i64) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| DR_CLASSES.get(i))
            .copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Short label used on result cards
    pub fn name(self) -> &'static str {
        match self {
            DrClass::NoDr => "No DR",
            DrClass::Mild => "Mild NPDR",
            DrClass::Moderate => "Moderate NPDR",
            DrClass::Severe => "Severe NPDR",
            DrClass::Proliferative => "PDR",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            DrClass::NoDr => "No signs of diabetic retinopathy",
            DrClass::Mild => "Mild non-proliferative diabetic retinopathy",
            DrClass::Moderate => "Moderate non-proliferative diabetic retinopathy",
            DrClass::Severe => "Severe non-proliferative diabetic retinopathy",
            DrClass::Proliferative => "Proliferative diabetic retinopathy",
        }
    }

    /// True for every stage other than `NoDr`
    pub fn is_abnormal(self) -> bool {
        self != DrClass::NoDr
    }
}

impl TryFrom<u8> for DrClass {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        DrClass::from_index(i64::from(value))
            .ok_or_else(|| format!("prediction class {} outside 0..=4", value))
    }
}

impl From<DrClass> for u8 {
    fn from(class: DrClass) -> Self {
        class.index()
    }
}

impl fmt::Display for DrClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display band for a confidence value, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Elevated,
    Moderate,
    Low,
}

impl ConfidenceBand {
    /// Band for a probability in [0,1]
    ///
    /// Thresholds are strict: exactly 50% is `Elevated`, not `High`.
    pub fn for_probability(probability: f64) -> Self {
        let percent = probability * 100.0;
        if percent > 50.0 {
            ConfidenceBand::High
        } else if percent > 30.0 {
            ConfidenceBand::Elevated
        } else if percent > 15.0 {
            ConfidenceBand::Moderate
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Elevated => "elevated",
            ConfidenceBand::Moderate => "moderate",
            ConfidenceBand::Low => "low",
        }
    }
}
