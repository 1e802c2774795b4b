//! Analysis session state
//!
//! The session is split into disjoint slots so the two analysis tasks never
//! contend with each other: each task writes only its own slot, and the save
//! and train flags live apart from both.
//!
//! Every analysis invocation is stamped with a generation token. Slots
//! remember the generation they were last reset for and refuse results
//! stamped with any other generation, so a task that outlives its file can
//! never overwrite the results of a newer one.

use crate::models::{
    ConfidenceBand, ImageUpload, OperationOutcome, OperationState, Prediction,
    PredictionOverlay, ReviewFinding, ReviewResults,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Relative URL under which the current image is served back
pub const IMAGE_PREVIEW_REF: &str = "/api/image";

/// Result slot owned by one analysis operation
#[derive(Debug, Default)]
pub struct AnalysisSlot<T> {
    generation: u64,
    state: OperationState,
    value: T,
}

impl<T: Default> AnalysisSlot<T> {
    /// Clear the slot and mark it pending for `generation`
    ///
    /// Ignored (returns false) when the slot already belongs to a newer
    /// generation.
    pub fn reset_for(&mut self, generation: u64) -> bool {
        if generation < self.generation {
            return false;
        }
        self.generation = generation;
        self.state.begin();
        self.value = T::default();
        true
    }

    /// Overwrite the slot with a settled result
    ///
    /// Returns false, leaving the slot untouched, when `generation` is not the
    /// generation the slot was last reset for.
    pub fn settle(&mut self, generation: u64, outcome: OperationOutcome, value: T) -> bool {
        if generation != self.generation {
            return false;
        }
        self.state.settle(outcome);
        self.value = value;
        true
    }
}

impl<T> AnalysisSlot<T> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_pending()
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

#[derive(Debug)]
struct CurrentFile {
    generation: u64,
    upload: ImageUpload,
}

/// Shared analysis session
///
/// Created empty; reset on every accepted file.
#[derive(Debug, Default)]
pub struct SessionStore {
    generation: AtomicU64,
    file: RwLock<Option<CurrentFile>>,
    predictions: RwLock<AnalysisSlot<PredictionOverlay>>,
    review: RwLock<AnalysisSlot<ReviewResults>>,
    saving: RwLock<OperationState>,
    training: RwLock<OperationState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the most recently accepted file (0 before any)
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Make `upload` the current file and reset both analysis slots
    ///
    /// Returns the new generation token. Both slots are pending afterwards.
    pub async fn accept_file(&self, upload: ImageUpload) -> u64 {
        let generation = self.next_generation();

        {
            let mut file = self.file.write().await;
            // A racing accept may already have stored a newer file
            if file.as_ref().map_or(true, |f| f.generation < generation) {
                *file = Some(CurrentFile { generation, upload });
            }
        }
        self.predictions.write().await.reset_for(generation);
        self.review.write().await.reset_for(generation);

        generation
    }

    /// The currently loaded file, if any
    pub async fn current_file(&self) -> Option<ImageUpload> {
        self.file.read().await.as_ref().map(|f| f.upload.clone())
    }

    /// Write classifier results for `generation`
    ///
    /// Returns false when the results are stale and were discarded.
    pub async fn settle_predictions(
        &self,
        generation: u64,
        outcome: OperationOutcome,
        overlay: PredictionOverlay,
    ) -> bool {
        self.predictions
            .write()
            .await
            .settle(generation, outcome, overlay)
    }

    /// Write review results for `generation`
    ///
    /// Returns false when the results are stale and were discarded.
    pub async fn settle_review(
        &self,
        generation: u64,
        outcome: OperationOutcome,
        results: ReviewResults,
    ) -> bool {
        self.review.write().await.settle(generation, outcome, results)
    }

    /// Copy of the current prediction overlay
    pub async fn predictions(&self) -> PredictionOverlay {
        self.predictions.read().await.value().clone()
    }

    /// Copy of the current review findings
    pub async fn review(&self) -> ReviewResults {
        self.review.read().await.value().clone()
    }

    /// The current file together with the overlay computed for it
    ///
    /// Both are read while holding the file lock, and the overlay is used only
    /// when its slot belongs to the file's generation. While a newer file is
    /// being accepted its slot may still hold the previous file's results;
    /// those are never paired with the new image and an empty overlay is
    /// returned instead.
    pub async fn correction_input(&self) -> Option<(ImageUpload, PredictionOverlay)> {
        let file = self.file.read().await;
        let current = file.as_ref()?;
        let slot = self.predictions.read().await;
        let overlay = if slot.generation() == current.generation {
            slot.value().clone()
        } else {
            PredictionOverlay::default()
        };
        Some((current.upload.clone(), overlay))
    }

    /// Toggle one prediction, checking the index under the slot lock
    ///
    /// Returns the updated list, or `None` when `index` does not address an
    /// entry of the current list.
    pub async fn toggle_prediction(&self, index: usize) -> Option<Vec<Prediction>> {
        let mut slot = self.predictions.write().await;
        if index >= slot.value.len() {
            return None;
        }
        slot.value.toggle(index);
        Some(slot.value.predictions().to_vec())
    }

    /// Make sure the named prediction is disabled
    ///
    /// Toggles only an entry that is still enabled, so repeating the call is a
    /// no-op. Returns `None` when no prediction has that name.
    pub async fn disable_prediction(&self, pathology: &str) -> Option<usize> {
        let mut slot = self.predictions.write().await;
        let index = slot.value.position_of(pathology)?;
        if slot.value.predictions()[index].enabled {
            slot.value.toggle(index);
        }
        Some(index)
    }

    pub async fn predictions_loading(&self) -> bool {
        self.predictions.read().await.is_loading()
    }

    pub async fn review_loading(&self) -> bool {
        self.review.read().await.is_loading()
    }

    pub async fn begin_saving(&self) {
        self.saving.write().await.begin();
    }

    pub async fn settle_saving(&self, outcome: OperationOutcome) {
        self.saving.write().await.settle(outcome);
    }

    pub async fn begin_training(&self) {
        self.training.write().await.begin();
    }

    pub async fn settle_training(&self, outcome: OperationOutcome) {
        self.training.write().await.settle(outcome);
    }

    /// Serializable view of the whole session
    pub async fn snapshot(&self) -> SessionSnapshot {
        let (file_name, image_preview_ref) = match self.file.read().await.as_ref() {
            Some(f) => (Some(f.upload.file_name().to_string()), Some(IMAGE_PREVIEW_REF)),
            None => (None, None),
        };
        let (predictions, predictions_state) = {
            let slot = self.predictions.read().await;
            let views = slot
                .value()
                .predictions()
                .iter()
                .enumerate()
                .map(|(index, p)| PredictionView::new(index, p))
                .collect();
            (views, slot.state())
        };
        let (review_findings, review_state) = {
            let slot = self.review.read().await;
            (slot.value().findings().to_vec(), slot.state())
        };
        let saving_state = *self.saving.read().await;
        let training_state = *self.training.read().await;

        SessionSnapshot {
            generation: self.current_generation(),
            file_name,
            image_preview_ref,
            predictions,
            review_findings,
            predictions_loading: predictions_state.is_pending(),
            review_loading: review_state.is_pending(),
            saving: saving_state.is_pending(),
            training: training_state.is_pending(),
            predictions_state,
            review_state,
            saving_state,
            training_state,
        }
    }
}

/// One prediction as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionView {
    pub index: usize,
    pub pathology: String,
    pub confidence: f64,
    pub enabled: bool,
    pub band: ConfidenceBand,
}

impl PredictionView {
    fn new(index: usize, prediction: &Prediction) -> Self {
        Self {
            index,
            pathology: prediction.pathology.clone(),
            confidence: prediction.confidence,
            enabled: prediction.enabled,
            band: prediction.confidence_band(),
        }
    }
}

/// Read view of the analysis session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub file_name: Option<String>,
    pub image_preview_ref: Option<&'static str>,
    pub predictions: Vec<PredictionView>,
    pub review_findings: Vec<ReviewFinding>,
    pub predictions_loading: bool,
    pub review_loading: bool,
    pub saving: bool,
    pub training: bool,
    pub predictions_state: OperationState,
    pub review_state: OperationState,
    pub saving_state: OperationState,
    pub training_state: OperationState,
}
