//! Image upload and preview

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::models::ImageUpload;
use crate::session::IMAGE_PREVIEW_REF;
use crate::AppState;

/// Multipart field carrying the image
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub generation: u64,
    pub file_name: String,
    pub image_preview_ref: &'static str,
}

/// POST /api/image
///
/// Validates the file and answers 202 as soon as it is accepted; the analysis
/// settles in the background and reports through `/events`.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        upload = Some(ImageUpload::new(file_name, content_type, data));
        break;
    }
    let upload = upload.ok_or_else(|| {
        ApiError::BadRequest(format!("Missing multipart field '{}'", IMAGE_FIELD))
    })?;

    let ticket = state.labeler.select_file(upload).await?;
    let response = UploadResponse {
        generation: ticket.generation(),
        file_name: ticket.upload().file_name().to_string(),
        image_preview_ref: IMAGE_PREVIEW_REF,
    };

    let labeler = Arc::clone(&state.labeler);
    tokio::spawn(async move {
        let summary = labeler.orchestrator.run(ticket).await;
        debug!(?summary, "Background analysis finished");
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/image
///
/// Serves the current file back for preview.
pub async fn get_image(State(state): State<AppState>) -> ApiResult<Response> {
    let file = state
        .labeler
        .session
        .current_file()
        .await
        .ok_or_else(|| ApiError::NotFound("No image loaded".to_string()))?;

    let content_type = preview_content_type(&file).to_string();
    Ok(([(header::CONTENT_TYPE, content_type)], file.bytes()).into_response())
}

/// Declared type, or one guessed from the extension
fn preview_content_type(file: &ImageUpload) -> &str {
    if let Some(content_type) = file.content_type() {
        return content_type;
    }
    let extension = file
        .file_name()
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("dcm") => "application/dicom",
        _ => "application/octet-stream",
    }
}

pub fn image_routes() -> Router<AppState> {
    Router::new().route(IMAGE_PREVIEW_REF, get(get_image).post(upload_image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_content_type() {
        let declared = ImageUpload::new("x.bin", Some("image/png".to_string()), vec![0u8]);
        assert_eq!(preview_content_type(&declared), "image/png");

        let guessed = ImageUpload::new("scan.DCM", None, vec![0u8]);
        assert_eq!(preview_content_type(&guessed), "application/dicom");

        let unknown = ImageUpload::new("blob", None, vec![0u8]);
        assert_eq!(preview_content_type(&unknown), "application/octet-stream");
    }
}
