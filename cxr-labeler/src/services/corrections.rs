//! Correction submitter
//!
//! Sends the enabled predictions, together with the original image, to the
//! save-labels endpoint. Local prediction state is never modified here.

use crate::error::LabelerError;
use crate::models::{CorrectionLabels, ImageUpload, OperationOutcome, PredictionOverlay};
use crate::services::backend::AnalysisBackend;
use crate::session::SessionStore;
use chrono::Utc;
use cxr_common::events::{EventBus, LabelerEvent};
use std::sync::Arc;
use tracing::{info, warn};

/// Submit corrections for `file`
///
/// Returns `NoFileLoaded` without touching the network when `file` is `None`.
/// On success returns the payload that was sent.
pub async fn submit_corrections(
    backend: &dyn AnalysisBackend,
    file: Option<&ImageUpload>,
    overlay: &PredictionOverlay,
) -> Result<CorrectionLabels, LabelerError> {
    let file = file.ok_or(LabelerError::NoFileLoaded)?;
    let labels = overlay.correction_labels();

    backend
        .save_labels(file, &labels)
        .await
        .map_err(|e| LabelerError::SaveFailed(e.to_string()))?;

    Ok(labels)
}

/// Session-bound submitter that also drives the `saving` flag and notices
#[derive(Clone)]
pub struct CorrectionSubmitter {
    backend: Arc<dyn AnalysisBackend>,
    session: Arc<SessionStore>,
    event_bus: EventBus,
}

impl CorrectionSubmitter {
    pub fn new(
        backend: Arc<dyn AnalysisBackend>,
        session: Arc<SessionStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            backend,
            session,
            event_bus,
        }
    }

    /// Submit the current overlay for the current file
    ///
    /// File and overlay are read once, together, at call time; toggles made
    /// while the request is in flight belong to the next submission.
    pub async fn submit(&self) -> Result<CorrectionLabels, LabelerError> {
        let Some((file, overlay)) = self.session.correction_input().await else {
            let error = LabelerError::NoFileLoaded;
            warn!("Corrections requested with no image loaded");
            self.event_bus.emit_lossy(error.to_event());
            return Err(error);
        };

        self.session.begin_saving().await;
        let result = submit_corrections(self.backend.as_ref(), Some(&file), &overlay).await;

        match &result {
            Ok(labels) => {
                self.session.settle_saving(OperationOutcome::Success).await;
                info!(file = file.file_name(), labels = labels.len(), "Corrections saved");
                self.event_bus.emit_lossy(LabelerEvent::CorrectionsSaved {
                    label_count: labels.len(),
                    title: "Corrections saved".to_string(),
                    message: "Your label corrections have been saved successfully".to_string(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                self.session.settle_saving(OperationOutcome::Failure).await;
                warn!(file = file.file_name(), error = %e, "Saving corrections failed");
                self.event_bus.emit_lossy(e.to_event());
            }
        }

        result
    }
}
