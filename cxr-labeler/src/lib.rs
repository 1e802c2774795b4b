//! cxr-labeler library interface
//!
//! Chest X-ray labeling core plus the HTTP service that exposes it.

pub mod api;
pub mod config;
pub mod error;
pub mod labeler;
pub mod logging;
pub mod models;
pub mod services;
pub mod session;
pub mod validation;

pub use crate::error::{ApiError, ApiResult, LabelerError};
pub use crate::labeler::Labeler;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted upload (DICOM studies run to tens of megabytes)
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub labeler: Arc<Labeler>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(labeler: Arc<Labeler>) -> Self {
        Self {
            labeler,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember an error for the health endpoint
    pub async fn record_error(&self, error: impl ToString) {
        *self.last_error.write().await = Some(error.to_string());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::image_routes())
        .merge(api::session_routes())
        .merge(api::action_routes())
        .merge(api::health_routes())
        .merge(api::event_routes())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
