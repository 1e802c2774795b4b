//! Event types for the CXR event system
//!
//! Provides the shared event definitions and the EventBus. Every user-facing
//! notice (failure conditions and completion messages) travels through the
//! bus; the HTTP service forwards it to browsers over SSE and the CLI prints it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Recoverable condition kinds surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// Selected file rejected before any network call
    InvalidFileType,
    /// Pathology classification call failed
    PredictionFailed,
    /// Structured review call failed
    ReviewFailed,
    /// Saving label corrections failed
    SaveFailed,
    /// Retrain request failed
    TrainingFailed,
    /// Save requested without a loaded image
    NoFileLoaded,
}

impl ConditionKind {
    /// Stable string form (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::InvalidFileType => "invalid_file_type",
            ConditionKind::PredictionFailed => "prediction_failed",
            ConditionKind::ReviewFailed => "review_failed",
            ConditionKind::SaveFailed => "save_failed",
            ConditionKind::TrainingFailed => "training_failed",
            ConditionKind::NoFileLoaded => "no_file_loaded",
        }
    }
}

/// The two remote analysis operations fanned out per image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisOperation {
    /// Pathology classifier (`/predict`)
    Predict,
    /// Systematic review evaluator (`/paceman`)
    Review,
}

/// How a remote operation settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Success,
    Failure,
}

/// CXR event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LabelerEvent {
    /// A file passed the validation gate and a new analysis generation began
    FileAccepted {
        /// Generation token stamped on this analysis
        generation: u64,
        /// Original file name
        file_name: String,
        /// When the file was accepted
        timestamp: DateTime<Utc>,
    },

    /// One of the two analysis operations settled for the current generation
    OperationSettled {
        generation: u64,
        operation: AnalysisOperation,
        outcome: OperationOutcome,
        /// Number of results written (0 on failure)
        result_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Both analysis operations settled and at least one produced results
    AnalysisComplete {
        generation: u64,
        prediction_count: usize,
        finding_count: usize,
        title: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A recoverable condition the user should be told about
    ConditionRaised {
        condition: ConditionKind,
        title: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Label corrections accepted by the backend
    CorrectionsSaved {
        /// Number of enabled labels submitted
        label_count: usize,
        title: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Backend accepted a retraining job
    TrainingInitiated {
        title: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl LabelerEvent {
    /// Build a `ConditionRaised` event stamped now
    pub fn condition(
        condition: ConditionKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        LabelerEvent::ConditionRaised {
            condition,
            title: title.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Event type name (used as the SSE `event:` field)
    pub fn event_type(&self) -> &'static str {
        match self {
            LabelerEvent::FileAccepted { .. } => "FileAccepted",
            LabelerEvent::OperationSettled { .. } => "OperationSettled",
            LabelerEvent::AnalysisComplete { .. } => "AnalysisComplete",
            LabelerEvent::ConditionRaised { .. } => "ConditionRaised",
            LabelerEvent::CorrectionsSaved { .. } => "CorrectionsSaved",
            LabelerEvent::TrainingInitiated { .. } => "TrainingInitiated",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use cxr_common::events::{ConditionKind, EventBus, LabelerEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(LabelerEvent::condition(
///     ConditionKind::NoFileLoaded,
///     "No image loaded",
///     "Please upload an image first",
/// ));
///
/// let event = rx.try_recv().unwrap();
/// assert_eq!(event.event_type(), "ConditionRaised");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LabelerEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LabelerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LabelerEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_dropped() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit_lossy(LabelerEvent::condition(
            ConditionKind::SaveFailed,
            "Save failed",
            "Could not save corrections. Please try again.",
        ));

        // Late subscribers only see later events
        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(LabelerEvent::FileAccepted {
            generation: 1,
            file_name: "chest.png".to_string(),
            timestamp: Utc::now(),
        });
        bus.emit_lossy(LabelerEvent::condition(
            ConditionKind::ReviewFailed,
            "PACEMAN evaluation failed",
            "Could not connect to the PACEMAN API.",
        ));

        assert_eq!(rx.try_recv().unwrap().event_type(), "FileAccepted");
        assert_eq!(rx.try_recv().unwrap().event_type(), "ConditionRaised");
    }

    #[test]
    fn test_condition_event_serialization() {
        let event = LabelerEvent::condition(
            ConditionKind::InvalidFileType,
            "Invalid file type",
            "Please upload a .jpg, .jpeg, .png, or .dcm file",
        );
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "ConditionRaised");
        assert_eq!(json["condition"], "invalid_file_type");
        assert_eq!(json["title"], "Invalid file type");
    }

    #[test]
    fn test_condition_kind_as_str_matches_serde() {
        for kind in [
            ConditionKind::InvalidFileType,
            ConditionKind::PredictionFailed,
            ConditionKind::ReviewFailed,
            ConditionKind::SaveFailed,
            ConditionKind::TrainingFailed,
            ConditionKind::NoFileLoaded,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }
}
