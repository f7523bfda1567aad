//! Core types for GeoSight

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Terrain category predicted for a tile.
///
/// Declaration order is the model's output order. `Ord` follows it, so maps
/// keyed by `ClassLabel` iterate in class order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClassLabel {
    AnnualCrop,
    Forest,
    HerbaceousVegetation,
    Highway,
    Industrial,
    Pasture,
    PermanentCrop,
    Residential,
    River,
    SeaLake,
}

impl ClassLabel {
    /// Number of known classes
    pub const COUNT: usize = 10;

    /// Every label, in model output order
    pub const ALL: [ClassLabel; Self::COUNT] = [
        Self::AnnualCrop,
        Self::Forest,
        Self::HerbaceousVegetation,
        Self::Highway,
        Self::Industrial,
        Self::Pasture,
        Self::PermanentCrop,
        Self::Residential,
        Self::River,
        Self::SeaLake,
    ];

    /// Label at a model output position
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Model output position of this label
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical class name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnnualCrop => "AnnualCrop",
            Self::Forest => "Forest",
            Self::HerbaceousVegetation => "HerbaceousVegetation",
            Self::Highway => "Highway",
            Self::Industrial => "Industrial",
            Self::Pasture => "Pasture",
            Self::PermanentCrop => "PermanentCrop",
            Self::Residential => "Residential",
            Self::River => "River",
            Self::SeaLake => "SeaLake",
        }
    }

    /// Check that an externally supplied label list matches the fixed order.
    ///
    /// Used at startup when a model configuration names its labels.
    pub fn validate_order<S: AsRef<str>>(names: &[S]) -> Result<()> {
        if names.len() != Self::COUNT {
            return Err(Error::config(format!(
                "expected {} class labels, got {}",
                Self::COUNT,
                names.len()
            )));
        }

        for (idx, (name, expected)) in names.iter().zip(Self::ALL).enumerate() {
            if name.as_ref() != expected.as_str() {
                return Err(Error::config(format!(
                    "label {} is '{}', expected '{}'",
                    idx,
                    name.as_ref(),
                    expected
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| Error::config(format!("unknown class label '{}'", s)))
    }
}

/// One score per class, aligned by index with [`ClassLabel::ALL`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreVector([f32; ClassLabel::COUNT]);

impl ScoreVector {
    /// Wrap a fixed-size array of scores
    pub fn new(values: [f32; ClassLabel::COUNT]) -> Self {
        Self(values)
    }

    /// Build from a slice, failing unless it holds exactly one score per class
    pub fn from_slice(values: &[f32]) -> Result<Self> {
        let values: [f32; ClassLabel::COUNT] = values.try_into().map_err(|_| {
            Error::inference(format!(
                "expected {} class scores, got {}",
                ClassLabel::COUNT,
                values.len()
            ))
        })?;
        Ok(Self(values))
    }

    /// Scores in class order
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Score for a single label
    pub fn get(&self, label: ClassLabel) -> f32 {
        self.0[label.index()]
    }

    /// `(label, score)` pairs in class order
    pub fn iter(&self) -> impl Iterator<Item = (ClassLabel, f32)> + '_ {
        ClassLabel::ALL.into_iter().zip(self.0.iter().copied())
    }
}

impl TryFrom<Vec<f32>> for ScoreVector {
    type Error = Error;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Self::from_slice(&values)
    }
}

/// Description and recommended action for a terrain class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Insight {
    /// What the class means on the ground
    pub description: &'static str,

    /// What to do about it
    pub recommendation: &'static str,
}

impl Insight {
    /// Create a new insight
    pub const fn new(description: &'static str, recommendation: &'static str) -> Self {
        Self {
            description,
            recommendation,
        }
    }
}

/// Outcome of classifying one tile
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    /// Winning class
    pub label: ClassLabel,

    /// Probability of the winning class (0.0-1.0)
    pub confidence: f32,

    /// Probability of every class, in class order
    pub distribution: BTreeMap<ClassLabel, f32>,

    /// Insight for the winning class
    pub insight: Insight,

    /// End-to-end pipeline latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Convert into the transport representation
    pub fn to_response(&self) -> ClassificationResponse {
        ClassificationResponse::from(self)
    }
}

/// Success body sent to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    /// Predicted class name
    pub class: String,

    /// Probability of the predicted class
    pub confidence: f32,

    /// Insight description
    pub description: String,

    /// Insight recommendation
    pub recommendation: String,

    /// Class name to probability, for all classes
    pub chart_data: BTreeMap<String, f32>,
}

impl From<&ClassificationResult> for ClassificationResponse {
    fn from(result: &ClassificationResult) -> Self {
        Self {
            class: result.label.to_string(),
            confidence: result.confidence,
            description: result.insight.description.to_string(),
            recommendation: result.insight.recommendation.to_string(),
            chart_data: result
                .distribution
                .iter()
                .map(|(label, p)| (label.to_string(), *p))
                .collect(),
        }
    }
}

/// Failure body sent to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    /// Create a new error body
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self::new(err.public_message())
    }
}
