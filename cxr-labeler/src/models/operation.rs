//! Per-operation state machine
//!
//! `Idle → Pending → Settled(Success | Failure)`. A new invocation moves any
//! state back to `Pending`; there are no intermediate progress states.

use serde::{Deserialize, Serialize};

pub use cxr_common::events::OperationOutcome;

/// State of one remote operation (predict, review, save or train)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "outcome", rename_all = "snake_case")]
pub enum OperationState {
    /// Never started
    #[default]
    Idle,
    /// Request in flight
    Pending,
    /// Request finished
    Settled(OperationOutcome),
}

impl OperationState {
    /// True while a request is in flight (the "loading" flag)
    pub fn is_pending(&self) -> bool {
        matches!(self, OperationState::Pending)
    }

    pub fn begin(&mut self) {
        *self = OperationState::Pending;
    }

    pub fn settle(&mut self, outcome: OperationOutcome) {
        *self = OperationState::Settled(outcome);
    }
}
