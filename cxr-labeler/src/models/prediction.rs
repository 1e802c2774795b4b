//! Classifier predictions and the correction overlay
//!
//! The classifier's output is immutable except for one flag per entry:
//! `enabled`. The user flips it to mark a pathology as wrong, and the
//! correction payload is a projection of the enabled entries.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

/// Confidence at or above which a prediction is reported as high
pub const HIGH_CONFIDENCE: f64 = 0.8;

/// Confidence at or above which a prediction is reported as medium
pub const MEDIUM_CONFIDENCE: f64 = 0.5;

/// One classifier output
#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
pub struct Prediction {
    /// Pathology name (unique within a prediction list)
    pub pathology: String,
    /// Classifier confidence (0.0 to 1.0)
    pub confidence: f64,
    /// Whether the user keeps this label
    pub enabled: bool,
}

impl Prediction {
    /// New prediction, enabled by default
    pub fn new(pathology: impl Into<String>, confidence: f64) -> Self {
        Self {
            pathology: pathology.into(),
            confidence,
            enabled: true,
        }
    }

    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::from_confidence(self.confidence)
    }
}

/// Coarse confidence grouping shown next to each prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= HIGH_CONFIDENCE {
            ConfidenceBand::High
        } else if confidence >= MEDIUM_CONFIDENCE {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceBand::High => "High",
            ConfidenceBand::Medium => "Medium",
            ConfidenceBand::Low => "Low",
        }
    }
}

/// Ordered prediction list with a mutable enabled flag per entry
///
/// List order is display order and the index used for toggling. Length and
/// order never change after construction; only `toggle` mutates, and only the
/// `enabled` field of one entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionOverlay {
    predictions: Vec<Prediction>,
}

impl PredictionOverlay {
    /// Build the overlay from classifier scores, keeping their order
    ///
    /// Every entry starts enabled.
    pub fn from_scores<I, S>(scores: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            predictions: scores
                .into_iter()
                .map(|(pathology, confidence)| Prediction::new(pathology, confidence))
                .collect(),
        }
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.predictions.iter().filter(|p| p.enabled).count()
    }

    /// Index of the named pathology, if present
    pub fn position_of(&self, pathology: &str) -> Option<usize> {
        self.predictions.iter().position(|p| p.pathology == pathology)
    }

    /// Flip the `enabled` flag of the entry at `index`
    ///
    /// # Panics
    /// Panics if `index` is out of range. Callers must only pass indices taken
    /// from the current list.
    pub fn toggle(&mut self, index: usize) {
        let len = self.predictions.len();
        assert!(
            index < len,
            "prediction index {} out of range for {} predictions",
            index,
            len
        );
        let prediction = &mut self.predictions[index];
        prediction.enabled = !prediction.enabled;
    }

    /// Derive the correction payload: enabled entries only, in list order
    ///
    /// Disabled entries are absent from the result, not zero-weighted.
    pub fn correction_labels(&self) -> CorrectionLabels {
        CorrectionLabels {
            entries: self
                .predictions
                .iter()
                .filter(|p| p.enabled)
                .map(|p| (p.pathology.clone(), p.confidence))
                .collect(),
        }
    }
}

/// Label correction payload: pathology → confidence
///
/// Serializes as a JSON object whose keys follow the prediction list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectionLabels {
    entries: Vec<(String, f64)>,
}

impl CorrectionLabels {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, pathology: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == pathology)
            .map(|(_, confidence)| *confidence)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, c)| (name.as_str(), *c))
    }

    /// JSON text sent as the `labels` multipart field
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for CorrectionLabels {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (pathology, confidence) in &self.entries {
            map.serialize_entry(pathology, confidence)?;
        }
        map.end()
    }
}
