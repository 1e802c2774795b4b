//! Remote analysis backend client
//!
//! Four POST endpoints relative to one base URL:
//! - `/predict`: multipart `image` → `{ "predictions": { name: confidence } }`
//! - `/paceman`: multipart `image` → `{ "paceman": [ finding, ... ] }`
//! - `/save_labels`: multipart `image` + `labels` (JSON) → 2xx
//! - `/train`: empty body → 2xx
//!
//! Any transport error or non-2xx status is an error of that call. Nothing is
//! retried.

use crate::models::{CorrectionLabels, ImageUpload, ReviewFinding};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

pub const PREDICT_PATH: &str = "/predict";
pub const REVIEW_PATH: &str = "/paceman";
pub const SAVE_LABELS_PATH: &str = "/save_labels";
pub const TRAIN_PATH: &str = "/train";

const USER_AGENT: &str = concat!("cxr-labeler/", env!("CARGO_PKG_VERSION"));

/// Backend call errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// The remote analysis services
///
/// Implemented over HTTP by [`HttpAnalysisBackend`]; tests substitute
/// scripted implementations.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Classify the image: pathology scores in response order
    async fn predict(&self, image: &ImageUpload) -> Result<Vec<(String, f64)>, BackendError>;

    /// Run the structured review
    async fn review(&self, image: &ImageUpload) -> Result<Vec<ReviewFinding>, BackendError>;

    /// Store label corrections for the image
    async fn save_labels(
        &self,
        image: &ImageUpload,
        labels: &CorrectionLabels,
    ) -> Result<(), BackendError>;

    /// Start background retraining
    async fn train(&self) -> Result<(), BackendError>;
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    #[serde(default)]
    paceman: Option<Vec<ReviewFinding>>,
}

/// HTTP implementation of [`AnalysisBackend`]
pub struct HttpAnalysisBackend {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisBackend {
    /// Create a client for `base_url`
    ///
    /// `timeout` bounds each whole request; `None` waits indefinitely.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_form(&self, path: &str, form: Form) -> Result<reqwest::Response, BackendError> {
        let response = self
            .http_client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        check_status(response).await
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn predict(&self, image: &ImageUpload) -> Result<Vec<(String, f64)>, BackendError> {
        tracing::debug!(file = image.file_name(), bytes = image.len(), "Requesting predictions");

        let form = Form::new().part("image", image_part(image));
        let response = self.post_form(PREDICT_PATH, form).await?;
        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        parse_scores(body.predictions.unwrap_or_default())
    }

    async fn review(&self, image: &ImageUpload) -> Result<Vec<ReviewFinding>, BackendError> {
        tracing::debug!(file = image.file_name(), bytes = image.len(), "Requesting review");

        let form = Form::new().part("image", image_part(image));
        let response = self.post_form(REVIEW_PATH, form).await?;
        let body: ReviewResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        Ok(body.paceman.unwrap_or_default())
    }

    async fn save_labels(
        &self,
        image: &ImageUpload,
        labels: &CorrectionLabels,
    ) -> Result<(), BackendError> {
        let labels_json = labels
            .to_json()
            .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;
        tracing::debug!(file = image.file_name(), labels = %labels_json, "Saving labels");

        let form = Form::new()
            .part("image", image_part(image))
            .text("labels", labels_json);
        self.post_form(SAVE_LABELS_PATH, form).await?;
        Ok(())
    }

    async fn train(&self) -> Result<(), BackendError> {
        tracing::debug!("Requesting retraining");

        let response = self
            .http_client
            .post(self.url(TRAIN_PATH))
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(BackendError::Status(status.as_u16(), error_text));
    }
    Ok(response)
}

/// Multipart part carrying the image bytes, file name and declared type
///
/// The part streams from the upload's shared buffer; the bytes are not copied.
fn image_part(image: &ImageUpload) -> Part {
    let part = || {
        Part::stream_with_length(image.bytes(), image.len() as u64)
            .file_name(image.file_name().to_string())
    };
    match image.content_type() {
        // An unparseable declared type is sent without a mime header
        Some(content_type) => part().mime_str(content_type).unwrap_or_else(|_| part()),
        None => part(),
    }
}

/// Convert the classifier mapping into ordered scores
///
/// Order is the mapping's key order as received.
fn parse_scores(predictions: Map<String, Value>) -> Result<Vec<(String, f64)>, BackendError> {
    predictions
        .into_iter()
        .map(|(pathology, value)| match value.as_f64() {
            Some(confidence) => Ok((pathology, confidence)),
            None => Err(BackendError::Parse(format!(
                "confidence for {} is not a number: {}",
                pathology, value
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scores_keeps_key_order() {
        let body: PredictResponse = serde_json::from_str(
            r#"{"predictions":{"Pneumonia":0.92,"Effusion":0.4,"Atelectasis":0.1}}"#,
        )
        .unwrap();
        let scores = parse_scores(body.predictions.unwrap_or_default()).unwrap();
        let names: Vec<_> = scores.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Pneumonia", "Effusion", "Atelectasis"]);
        assert_eq!(scores[0].1, 0.92);
    }

    #[test]
    fn test_parse_scores_rejects_non_numeric() {
        let body: PredictResponse =
            serde_json::from_str(r#"{"predictions":{"Pneumonia":"high"}}"#).unwrap();
        let result = parse_scores(body.predictions.unwrap_or_default());
        assert!(matches!(result, Err(BackendError::Parse(_))));
    }

    #[test]
    fn test_missing_keys_are_empty() {
        let body: PredictResponse = serde_json::from_str("{}").unwrap();
        assert!(body.predictions.is_none());

        let body: ReviewResponse = serde_json::from_str(r#"{"paceman":null}"#).unwrap();
        assert!(body.paceman.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpAnalysisBackend::new("http://localhost:8000/", None).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert_eq!(backend.url(PREDICT_PATH), "http://localhost:8000/predict");
    }
}
