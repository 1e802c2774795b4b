//! Session snapshot and prediction toggling

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::models::Prediction;
use crate::session::SessionSnapshot;
use crate::AppState;

/// GET /api/session
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.labeler.session.snapshot().await)
}

/// POST /api/predictions/:index/toggle
///
/// Returns the updated prediction list. The index comes from the client, so it
/// is checked against the current list instead of trusting it.
pub async fn toggle_prediction(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> ApiResult<Json<Vec<Prediction>>> {
    match state.labeler.session.toggle_prediction(index).await {
        Some(predictions) => {
            debug!(index, enabled = predictions[index].enabled, "Prediction toggled");
            Ok(Json(predictions))
        }
        None => Err(ApiError::NotFound(format!("No prediction at index {}", index))),
    }
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/predictions/:index/toggle", post(toggle_prediction))
}
