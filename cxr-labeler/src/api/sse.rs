//! Server-Sent Events stream of labeling notices

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events
///
/// Streams every `LabelerEvent`: file accepted, operation settled, analysis
/// complete, conditions, corrections saved, training initiated.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    cxr_common::sse::create_event_sse_stream(&state.labeler.event_bus, "cxr-labeler")
}

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/events", get(event_stream))
}
