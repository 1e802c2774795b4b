//! Retrain trigger
//!
//! Only confirms that the backend accepted the job; progress is not tracked.

use crate::error::LabelerError;
use crate::models::OperationOutcome;
use crate::services::backend::AnalysisBackend;
use crate::session::SessionStore;
use chrono::Utc;
use cxr_common::events::{EventBus, LabelerEvent};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct RetrainTrigger {
    backend: Arc<dyn AnalysisBackend>,
    session: Arc<SessionStore>,
    event_bus: EventBus,
}

impl RetrainTrigger {
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

    /// Ask the backend to start retraining
    pub async fn trigger(&self) -> Result<(), LabelerError> {
        self.session.begin_training().await;

        match self.backend.train().await {
            Ok(()) => {
                self.session.settle_training(OperationOutcome::Success).await;
                info!("Model retraining initiated");
                self.event_bus.emit_lossy(LabelerEvent::TrainingInitiated {
                    title: "Training initiated".to_string(),
                    message: "Model retraining has been started in the background".to_string(),
                    timestamp: Utc::now(),
                });
                Ok(())
            }
            Err(e) => {
                self.session.settle_training(OperationOutcome::Failure).await;
                let error = LabelerError::TrainingFailed(e.to_string());
                warn!(error = %e, "Retrain request failed");
                self.event_bus.emit_lossy(error.to_event());
                Err(error)
            }
        }
    }
}
