//! Uploaded image handle

use axum::body::Bytes;
use std::fmt;
use std::path::Path;

/// An image selected by the user
///
/// Cloning is cheap: the bytes are reference-counted, so the same buffer is
/// handed to both analysis tasks, every outgoing request and the preview.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

impl ImageUpload {
    /// Create an upload from its parts
    ///
    /// `content_type` is the type declared by the sender, if any. It is not
    /// checked against the bytes.
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.filter(|ct| !ct.trim().is_empty()),
            data: data.into(),
        }
    }

    /// Read an upload from disk (no declared content type)
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, None, data))
    }

    /// Declare a content type (builder style)
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        self.content_type = (!content_type.trim().is_empty()).then_some(content_type);
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the bytes (no copy)
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Bytes are elided: uploads are several megabytes.
impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}
