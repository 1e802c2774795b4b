//! Correction submission and retraining

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

use crate::error::ApiResult;
use crate::models::CorrectionLabels;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CorrectionsResponse {
    pub label_count: usize,
    /// The payload that was sent (enabled predictions only)
    pub labels: CorrectionLabels,
}

#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub status: &'static str,
}

/// POST /api/corrections
///
/// 409 when no image is loaded, 502 when the backend rejects the save.
pub async fn submit_corrections(
    State(state): State<AppState>,
) -> ApiResult<Json<CorrectionsResponse>> {
    match state.labeler.submitter.submit().await {
        Ok(labels) => Ok(Json(CorrectionsResponse {
            label_count: labels.len(),
            labels,
        })),
        Err(e) => {
            state.record_error(&e).await;
            Err(e.into())
        }
    }
}

/// POST /api/train
pub async fn trigger_training(State(state): State<AppState>) -> ApiResult<Json<TrainResponse>> {
    match state.labeler.retrain.trigger().await {
        Ok(()) => Ok(Json(TrainResponse { status: "accepted" })),
        Err(e) => {
            state.record_error(&e).await;
            Err(e.into())
        }
    }
}

pub fn action_routes() -> Router<AppState> {
    Router::new()
        .route("/api/corrections", post(submit_corrections))
        .route("/api/train", post(trigger_training))
}
