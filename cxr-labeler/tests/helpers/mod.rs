//! Shared test helpers
//!
//! `ScriptedBackend` replays canned replies per file name. A reply can be
//! gated on a oneshot channel so a test decides when (and in which order) the
//! remote calls settle.

#![allow(dead_code)]

use async_trait::async_trait;
use cxr_common::events::{EventBus, LabelerEvent};
use cxr_labeler::models::{CorrectionLabels, ImageUpload, ReviewFinding, ReviewStatus};
use cxr_labeler::services::{AnalysisBackend, BackendError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};

pub type Scores = Vec<(String, f64)>;

/// One canned reply
pub enum Reply<T> {
    Ready(Result<T, BackendError>),
    Gated(oneshot::Receiver<Result<T, BackendError>>),
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T, BackendError> {
        match self {
            Reply::Ready(result) => result,
            Reply::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(BackendError::Network("gate dropped".to_string()))),
        }
    }
}

/// Observed backend call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Predict(String),
    Review(String),
    SaveLabels {
        file_name: String,
        labels: CorrectionLabels,
    },
    Train,
}

#[derive(Default)]
pub struct ScriptedBackend {
    predict: Mutex<HashMap<String, VecDeque<Reply<Scores>>>>,
    review: Mutex<HashMap<String, VecDeque<Reply<Vec<ReviewFinding>>>>>,
    save: Mutex<VecDeque<Result<(), BackendError>>>,
    train: Mutex<VecDeque<Result<(), BackendError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn predict_for(&self, file_name: &str, result: Result<Scores, BackendError>) {
        self.push_predict(file_name, Reply::Ready(result));
    }

    /// Gate the next predict reply for `file_name`; send on the returned sender to release it
    pub fn gate_predict(&self, file_name: &str) -> oneshot::Sender<Result<Scores, BackendError>> {
        let (tx, rx) = oneshot::channel();
        self.push_predict(file_name, Reply::Gated(rx));
        tx
    }

    pub fn review_for(&self, file_name: &str, result: Result<Vec<ReviewFinding>, BackendError>) {
        self.push_review(file_name, Reply::Ready(result));
    }

    pub fn gate_review(
        &self,
        file_name: &str,
    ) -> oneshot::Sender<Result<Vec<ReviewFinding>, BackendError>> {
        let (tx, rx) = oneshot::channel();
        self.push_review(file_name, Reply::Gated(rx));
        tx
    }

    pub fn save_result(&self, result: Result<(), BackendError>) {
        self.save.lock().unwrap().push_back(result);
    }

    pub fn train_result(&self, result: Result<(), BackendError>) {
        self.train.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push_predict(&self, file_name: &str, reply: Reply<Scores>) {
        self.predict
            .lock()
            .unwrap()
            .entry(file_name.to_string())
            .or_default()
            .push_back(reply);
    }

    fn push_review(&self, file_name: &str, reply: Reply<Vec<ReviewFinding>>) {
        self.review
            .lock()
            .unwrap()
            .entry(file_name.to_string())
            .or_default()
            .push_back(reply);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AnalysisBackend for ScriptedBackend {
    async fn predict(&self, image: &ImageUpload) -> Result<Scores, BackendError> {
        self.record(Call::Predict(image.file_name().to_string()));
        let reply = self
            .predict
            .lock()
            .unwrap()
            .get_mut(image.file_name())
            .and_then(|queue| queue.pop_front());
        match reply {
            Some(reply) => reply.resolve().await,
            None => Ok(Vec::new()),
        }
    }

    async fn review(&self, image: &ImageUpload) -> Result<Vec<ReviewFinding>, BackendError> {
        self.record(Call::Review(image.file_name().to_string()));
        let reply = self
            .review
            .lock()
            .unwrap()
            .get_mut(image.file_name())
            .and_then(|queue| queue.pop_front());
        match reply {
            Some(reply) => reply.resolve().await,
            None => Ok(Vec::new()),
        }
    }

    async fn save_labels(
        &self,
        image: &ImageUpload,
        labels: &CorrectionLabels,
    ) -> Result<(), BackendError> {
        self.record(Call::SaveLabels {
            file_name: image.file_name().to_string(),
            labels: labels.clone(),
        });
        let reply = self.save.lock().unwrap().pop_front();
        reply.unwrap_or(Ok(()))
    }

    async fn train(&self) -> Result<(), BackendError> {
        self.record(Call::Train);
        let reply = self.train.lock().unwrap().pop_front();
        reply.unwrap_or(Ok(()))
    }
}

pub fn scores(entries: &[(&str, f64)]) -> Scores {
    entries
        .iter()
        .map(|(name, confidence)| (name.to_string(), *confidence))
        .collect()
}

pub fn finding(category: &str, status: ReviewStatus, lines: &[&str]) -> ReviewFinding {
    ReviewFinding {
        category: category.to_string(),
        findings: lines.iter().map(|l| l.to_string()).collect(),
        status,
    }
}

pub fn png(file_name: &str) -> ImageUpload {
    ImageUpload::new(
        file_name,
        Some("image/png".to_string()),
        b"\x89PNG\r\n\x1a\n".to_vec(),
    )
}

pub fn transport_error() -> BackendError {
    BackendError::Network("connection refused".to_string())
}

pub fn test_bus() -> EventBus {
    EventBus::new(100)
}

/// Collect everything currently queued on `rx`
pub fn drain(rx: &mut broadcast::Receiver<LabelerEvent>) -> Vec<LabelerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wait (bounded) for the first event matching `pred`
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<LabelerEvent>, pred: F) -> LabelerEvent
where
    F: Fn(&LabelerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("event bus closed: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
