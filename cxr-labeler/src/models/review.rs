//! Structured review findings
//!
//! The review evaluator returns one entry per anatomical category. Entries are
//! stored exactly as received and replaced wholesale on the next analysis.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Anatomical categories the review evaluator reports on, in display order
pub const REVIEW_CATEGORIES: [&str; 7] = [
    "Patient & Projection",
    "Airway",
    "Cardiac",
    "Everything Else",
    "Muscles & Soft Tissues",
    "Abdomen",
    "Neck",
];

/// Overall status of one review category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Normal,
    Attention,
    Abnormal,
}

impl ReviewStatus {
    /// Display label
    pub fn label(&self) -> &'static str {
        match self {
            ReviewStatus::Normal => "Normal",
            ReviewStatus::Attention => "Needs Attention",
            ReviewStatus::Abnormal => "Abnormal",
        }
    }
}

/// One category of the structured review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub category: String,
    #[serde(default)]
    pub findings: Vec<String>,
    pub status: ReviewStatus,
}

impl ReviewFinding {
    pub fn is_known_category(&self) -> bool {
        REVIEW_CATEGORIES.contains(&self.category.as_str())
    }
}

/// Read-only list of review findings for one analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReviewResults {
    findings: Vec<ReviewFinding>,
}

impl ReviewResults {
    /// Wrap the evaluator's findings verbatim
    ///
    /// Unknown categories are kept; they are only logged.
    pub fn new(findings: Vec<ReviewFinding>) -> Self {
        for finding in findings.iter().filter(|f| !f.is_known_category()) {
            warn!(category = %finding.category, "Review finding has unrecognized category");
        }
        Self { findings }
    }

    pub fn findings(&self) -> &[ReviewFinding] {
        &self.findings
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}
