//! Validation gate for selected files
//!
//! A file passes if its declared content type OR its filename extension is on
//! the allow-list. The bytes are never inspected.

use crate::error::LabelerError;
use crate::models::ImageUpload;

/// Declared content types accepted as chest images
pub const ACCEPTED_CONTENT_TYPES: [&str; 4] =
    ["image/jpeg", "image/jpg", "image/png", "application/dicom"];

/// Filename extensions accepted as chest images (lowercase, no dot)
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "dcm"];

/// Accept or reject a selected file
///
/// Returns the file unchanged on acceptance. No side effects either way; the
/// caller reports the `InvalidFileType` condition.
pub fn validate_image(upload: ImageUpload) -> Result<ImageUpload, LabelerError> {
    if has_accepted_content_type(upload.content_type())
        || has_accepted_extension(upload.file_name())
    {
        Ok(upload)
    } else {
        Err(LabelerError::InvalidFileType {
            file_name: upload.file_name().to_string(),
        })
    }
}

fn has_accepted_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    // Drop parameters such as "; charset=binary"
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    ACCEPTED_CONTENT_TYPES
        .iter()
        .any(|accepted| accepted.eq_ignore_ascii_case(essence))
}

fn has_accepted_extension(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ACCEPTED_EXTENSIONS
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(ext)),
        None => false,
    }
}
