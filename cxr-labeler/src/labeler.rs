//! Composition root for the labeling core
//!
//! Wires one backend, one session and one event bus into the orchestrator,
//! the correction submitter and the retrain trigger. The HTTP service and the
//! CLI both drive the core through this type.

use crate::error::LabelerError;
use crate::models::ImageUpload;
use crate::services::{
    AnalysisBackend, AnalysisOrchestrator, AnalysisTicket, CorrectionSubmitter, RetrainTrigger,
};
use crate::session::SessionStore;
use crate::validation::validate_image;
use cxr_common::events::EventBus;
use std::sync::Arc;
use tracing::warn;

pub struct Labeler {
    pub session: Arc<SessionStore>,
    pub orchestrator: AnalysisOrchestrator,
    pub submitter: CorrectionSubmitter,
    pub retrain: RetrainTrigger,
    pub event_bus: EventBus,
}

impl Labeler {
    pub fn new(backend: Arc<dyn AnalysisBackend>, event_bus: EventBus) -> Self {
        let session = Arc::new(SessionStore::new());
        Self {
            orchestrator: AnalysisOrchestrator::new(
                Arc::clone(&backend),
                Arc::clone(&session),
                event_bus.clone(),
            ),
            submitter: CorrectionSubmitter::new(
                Arc::clone(&backend),
                Arc::clone(&session),
                event_bus.clone(),
            ),
            retrain: RetrainTrigger::new(backend, Arc::clone(&session), event_bus.clone()),
            session,
            event_bus,
        }
    }

    /// Entry point for a newly selected file
    ///
    /// Runs the validation gate. A rejected file raises `InvalidFileType` and
    /// leaves the session untouched; an accepted one becomes the current file
    /// and the returned ticket is ready for `orchestrator.run`.
    pub async fn select_file(&self, upload: ImageUpload) -> Result<AnalysisTicket, LabelerError> {
        match validate_image(upload) {
            Ok(accepted) => Ok(self.orchestrator.begin(accepted).await),
            Err(e) => {
                warn!(error = %e, "File rejected");
                self.event_bus.emit_lossy(e.to_event());
                Err(e)
            }
        }
    }
}
