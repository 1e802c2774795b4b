//! Analysis orchestrator
//!
//! Fans one accepted image out to the classifier and the review evaluator.
//! The two calls run as separate tasks; each settles its own slot as soon as
//! it finishes, and the combined summary waits for both.
//!
//! Failures are isolated per operation: a failed call empties its own slot
//! and raises its own condition, and never aborts the other call.

use crate::error::LabelerError;
use crate::models::{ImageUpload, OperationOutcome, PredictionOverlay, ReviewResults};
use crate::services::backend::AnalysisBackend;
use crate::session::SessionStore;
use chrono::Utc;
use cxr_common::events::{AnalysisOperation, EventBus, LabelerEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handle for an accepted image whose analysis has not run yet
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    generation: u64,
    upload: ImageUpload,
}

impl AnalysisTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn upload(&self) -> &ImageUpload {
        &self.upload
    }
}

/// Combined result of one analysis once both operations settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub generation: u64,
    pub prediction_count: usize,
    pub finding_count: usize,
    /// A newer file was accepted before this analysis finished
    pub superseded: bool,
}

impl AnalysisSummary {
    /// Whether the completion notice is shown
    ///
    /// Nothing is announced when both counts are zero (the failure conditions
    /// already cover it) or when the analysis was superseded.
    pub fn is_announced(&self) -> bool {
        !self.superseded && self.prediction_count + self.finding_count > 0
    }

    pub fn message(&self) -> String {
        format!(
            "Generated {} predictions and {} PACEMAN findings",
            self.prediction_count, self.finding_count
        )
    }
}

/// How one operation settled, as seen by the combined summary
struct Settled {
    count: usize,
    /// False when the result was discarded as stale
    applied: bool,
}

/// Coordinates the two analysis operations for each accepted image
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    backend: Arc<dyn AnalysisBackend>,
    session: Arc<SessionStore>,
    event_bus: EventBus,
}

impl AnalysisOrchestrator {
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

    /// Accept an image: make it current, reset both slots, stamp a generation
    ///
    /// Both loading flags are set when this returns.
    pub async fn begin(&self, upload: ImageUpload) -> AnalysisTicket {
        let generation = self.session.accept_file(upload.clone()).await;
        info!(generation, file = upload.file_name(), bytes = upload.len(), "Image accepted");

        self.event_bus.emit_lossy(LabelerEvent::FileAccepted {
            generation,
            file_name: upload.file_name().to_string(),
            timestamp: Utc::now(),
        });

        AnalysisTicket { generation, upload }
    }

    /// Run both operations for `ticket` and wait until both settle
    ///
    /// Never fails: operation errors become conditions on the event bus.
    pub async fn run(&self, ticket: AnalysisTicket) -> AnalysisSummary {
        let AnalysisTicket { generation, upload } = ticket;

        let predict_task = tokio::spawn({
            let this = self.clone();
            let upload = upload.clone();
            async move { this.run_predict(generation, &upload).await }
        });
        let review_task = tokio::spawn({
            let this = self.clone();
            async move { this.run_review(generation, &upload).await }
        });

        // All-settled join: neither result short-circuits the other
        let (predicted, reviewed) = tokio::join!(predict_task, review_task);

        let predicted = match predicted {
            Ok(settled) => settled,
            Err(e) => {
                warn!(generation, error = %e, "Prediction task aborted");
                self.settle_predictions(
                    generation,
                    Err(LabelerError::PredictionFailed(e.to_string())),
                )
                .await
            }
        };
        let reviewed = match reviewed {
            Ok(settled) => settled,
            Err(e) => {
                warn!(generation, error = %e, "Review task aborted");
                self.settle_review(generation, Err(LabelerError::ReviewFailed(e.to_string())))
                    .await
            }
        };

        let summary = AnalysisSummary {
            generation,
            prediction_count: predicted.count,
            finding_count: reviewed.count,
            superseded: !predicted.applied
                || !reviewed.applied
                || self.session.current_generation() != generation,
        };

        if summary.is_announced() {
            info!(
                generation,
                predictions = summary.prediction_count,
                findings = summary.finding_count,
                "Analysis complete"
            );
            self.event_bus.emit_lossy(LabelerEvent::AnalysisComplete {
                generation,
                prediction_count: summary.prediction_count,
                finding_count: summary.finding_count,
                title: "Analysis complete".to_string(),
                message: summary.message(),
                timestamp: Utc::now(),
            });
        } else if summary.superseded {
            debug!(generation, "Analysis superseded by a newer image; summary dropped");
        }

        summary
    }

    /// Accept an image and run its analysis to completion
    pub async fn analyze(&self, upload: ImageUpload) -> AnalysisSummary {
        let ticket = self.begin(upload).await;
        self.run(ticket).await
    }

    async fn run_predict(&self, generation: u64, upload: &ImageUpload) -> Settled {
        let result = self
            .backend
            .predict(upload)
            .await
            .map(PredictionOverlay::from_scores)
            .map_err(|e| LabelerError::PredictionFailed(e.to_string()));
        self.settle_predictions(generation, result).await
    }

    async fn run_review(&self, generation: u64, upload: &ImageUpload) -> Settled {
        let result = self
            .backend
            .review(upload)
            .await
            .map(ReviewResults::new)
            .map_err(|e| LabelerError::ReviewFailed(e.to_string()));
        self.settle_review(generation, result).await
    }

    async fn settle_predictions(
        &self,
        generation: u64,
        result: Result<PredictionOverlay, LabelerError>,
    ) -> Settled {
        let (outcome, overlay, error) = split_result(result);
        let count = overlay.len();
        let applied = self
            .session
            .settle_predictions(generation, outcome, overlay)
            .await;
        self.report(generation, AnalysisOperation::Predict, outcome, count, applied, error)
    }

    async fn settle_review(
        &self,
        generation: u64,
        result: Result<ReviewResults, LabelerError>,
    ) -> Settled {
        let (outcome, results, error) = split_result(result);
        let count = results.len();
        let applied = self
            .session
            .settle_review(generation, outcome, results)
            .await;
        self.report(generation, AnalysisOperation::Review, outcome, count, applied, error)
    }

    fn report(
        &self,
        generation: u64,
        operation: AnalysisOperation,
        outcome: OperationOutcome,
        count: usize,
        applied: bool,
        error: Option<LabelerError>,
    ) -> Settled {
        if !applied {
            debug!(
                generation,
                ?operation,
                ?outcome,
                "Discarding result of superseded analysis"
            );
            return Settled {
                count,
                applied: false,
            };
        }

        match &error {
            Some(e) => warn!(generation, ?operation, error = %e, "Analysis operation failed"),
            None => info!(generation, ?operation, count, "Analysis operation settled"),
        }

        self.event_bus.emit_lossy(LabelerEvent::OperationSettled {
            generation,
            operation,
            outcome,
            result_count: count,
            timestamp: Utc::now(),
        });
        if let Some(e) = error {
            self.event_bus.emit_lossy(e.to_event());
        }

        Settled {
            count,
            applied: true,
        }
    }
}

/// Failure empties the slot
fn split_result<T: Default>(
    result: Result<T, LabelerError>,
) -> (OperationOutcome, T, Option<LabelerError>) {
    match result {
        Ok(value) => (OperationOutcome::Success, value, None),
        Err(e) => (OperationOutcome::Failure, T::default(), Some(e)),
    }
}
