//! Error types for cxr-labeler
//!
//! `LabelerError` is the user-recoverable condition taxonomy. Every variant
//! maps to a `ConditionKind` and carries the notice text shown to the user.
//! `ApiError` is the HTTP boundary error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cxr_common::events::{ConditionKind, LabelerEvent};
use serde_json::json;
use thiserror::Error;

/// Recoverable labeling conditions
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LabelerError {
    /// File rejected by the validation gate
    #[error("Unsupported file type: {file_name}")]
    InvalidFileType { file_name: String },

    /// Classifier call failed
    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    /// Review evaluator call failed
    #[error("Review failed: {0}")]
    ReviewFailed(String),

    /// Saving corrections failed
    #[error("Save failed: {0}")]
    SaveFailed(String),

    /// Retrain request failed
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// Save requested before any file was accepted
    #[error("No image loaded")]
    NoFileLoaded,
}

impl LabelerError {
    pub fn kind(&self) -> ConditionKind {
        match self {
            LabelerError::InvalidFileType { .. } => ConditionKind::InvalidFileType,
            LabelerError::PredictionFailed(_) => ConditionKind::PredictionFailed,
            LabelerError::ReviewFailed(_) => ConditionKind::ReviewFailed,
            LabelerError::SaveFailed(_) => ConditionKind::SaveFailed,
            LabelerError::TrainingFailed(_) => ConditionKind::TrainingFailed,
            LabelerError::NoFileLoaded => ConditionKind::NoFileLoaded,
        }
    }

    /// Notice title
    pub fn title(&self) -> &'static str {
        match self {
            LabelerError::InvalidFileType { .. } => "Invalid file type",
            LabelerError::PredictionFailed(_) => "Prediction failed",
            LabelerError::ReviewFailed(_) => "PACEMAN evaluation failed",
            LabelerError::SaveFailed(_) => "Save failed",
            LabelerError::TrainingFailed(_) => "Training failed",
            LabelerError::NoFileLoaded => "No image loaded",
        }
    }

    /// Notice body
    ///
    /// Transport details stay in the logs; the user sees a fixed message.
    pub fn description(&self) -> &'static str {
        match self {
            LabelerError::InvalidFileType { .. } => {
                "Please upload a .jpg, .jpeg, .png, or .dcm file"
            }
            LabelerError::PredictionFailed(_) => "Could not connect to the prediction API.",
            LabelerError::ReviewFailed(_) => "Could not connect to the PACEMAN API.",
            LabelerError::SaveFailed(_) => "Could not save corrections. Please try again.",
            LabelerError::TrainingFailed(_) => {
                "Could not start model training. Please try again."
            }
            LabelerError::NoFileLoaded => "Please upload an image first",
        }
    }

    /// `ConditionRaised` event for this error, stamped now
    pub fn to_event(&self) -> LabelerEvent {
        LabelerEvent::condition(self.kind(), self.title(), self.description())
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Labeling condition (status depends on the kind)
    #[error(transparent)]
    Labeler(#[from] LabelerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Labeler(ref err) => {
                let status = match err {
                    LabelerError::InvalidFileType { .. } => StatusCode::BAD_REQUEST,
                    LabelerError::NoFileLoaded => StatusCode::CONFLICT,
                    LabelerError::PredictionFailed(_)
                    | LabelerError::ReviewFailed(_)
                    | LabelerError::SaveFailed(_)
                    | LabelerError::TrainingFailed(_) => StatusCode::BAD_GATEWAY,
                };
                (status, err.kind().as_str(), err.description().to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
