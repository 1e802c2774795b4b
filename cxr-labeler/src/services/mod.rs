//! Services for cxr-labeler
//!
//! - Remote analysis backend (trait + HTTP client)
//! - Analysis orchestrator (concurrent predict/review fan-out)
//! - Correction submitter
//! - Retrain trigger

pub mod backend;
pub mod corrections;
pub mod orchestrator;
pub mod training;

pub use backend::{AnalysisBackend, BackendError, HttpAnalysisBackend};
pub use corrections::{submit_corrections, CorrectionSubmitter};
pub use orchestrator::{AnalysisOrchestrator, AnalysisSummary, AnalysisTicket};
pub use training::RetrainTrigger;
