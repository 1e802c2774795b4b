//! Data models for cxr-labeler
//!
//! - Uploaded image handle
//! - Classifier predictions and the enabled/disabled overlay
//! - Structured review findings
//! - Per-operation state machine

pub mod operation;
pub mod prediction;
pub mod review;
pub mod upload;

pub use operation::{OperationOutcome, OperationState};
pub use prediction::{ConfidenceBand, CorrectionLabels, Prediction, PredictionOverlay};
pub use review::{ReviewFinding, ReviewResults, ReviewStatus, REVIEW_CATEGORIES};
pub use upload::ImageUpload;
