//! Image uploads for item submissions.
//!
//! Uploads are checked against the allowed MIME types and the size limit, then
//! written under the uploads directory with a generated file name. The returned
//! reference (`/uploads/<file>`) is what gets stored on the item and is served
//! back by the HTTP layer.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const PUBLIC_PREFIX: &str = "/uploads";

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Image is required")]
    Missing,
    #[error("Only JPEG, PNG, JPG images are allowed (got '{0}')")]
    UnsupportedType(String),
    #[error("Image exceeds the {limit} byte limit ({size} bytes)")]
    TooLarge { size: usize, limit: usize },
    #[error("Image content does not match its declared type '{0}'")]
    SignatureMismatch(String),
    #[error("failed to write image {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Missing => AppError::validation("image_required".to_string(), err.to_string()),
            MediaError::UnsupportedType(_) => AppError::validation("image_type".to_string(), err.to_string()),
            MediaError::TooLarge { .. } => AppError::validation("image_too_large".to_string(), err.to_string()),
            MediaError::SignatureMismatch(_) => AppError::validation("image_content".to_string(), err.to_string()),
            MediaError::Io { .. } => {
                tracing::error!(target: "lostfound::media", "{}", err);
                AppError::storage("media_unavailable".to_string(), "Could not store the uploaded image".to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self { ImageFormat::Jpeg => "jpg", ImageFormat::Png => "png" }
    }

    fn magic(&self) -> &'static [u8] {
        match self { ImageFormat::Jpeg => JPEG_MAGIC, ImageFormat::Png => PNG_MAGIC }
    }
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Check type, size and signature without touching storage.
    pub fn validate(&self, max_bytes: usize) -> Result<ImageFormat, MediaError> {
        let format = ImageFormat::from_mime(&self.content_type)
            .ok_or_else(|| MediaError::UnsupportedType(self.content_type.clone()))?;
        if self.bytes.is_empty() { return Err(MediaError::Missing); }
        if self.bytes.len() > max_bytes {
            return Err(MediaError::TooLarge { size: self.bytes.len(), limit: max_bytes });
        }
        if !self.bytes.starts_with(format.magic()) {
            return Err(MediaError::SignatureMismatch(self.content_type.clone()));
        }
        Ok(format)
    }
}

pub trait MediaStore: Send + Sync {
    /// Persist an upload and return its public reference.
    fn store(&self, upload: &Upload) -> Result<String, MediaError>;
    /// Remove a previously stored reference. Unknown references are ignored.
    fn remove(&self, reference: &str) -> Result<(), MediaError>;
}

pub struct DiskMediaStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl DiskMediaStore {
    /// Create the store, ensuring the uploads directory exists.
    pub fn new<P: AsRef<Path>>(dir: P, max_bytes: usize) -> Result<Self, MediaError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|source| MediaError::Io { path: dir.clone(), source })?;
        Ok(Self { dir, max_bytes })
    }

    pub fn dir(&self) -> &Path { &self.dir }

    fn file_for(&self, reference: &str) -> Option<PathBuf> {
        let name = reference.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.starts_with('.') { return None; }
        Some(self.dir.join(name))
    }
}

impl MediaStore for DiskMediaStore {
    fn store(&self, upload: &Upload) -> Result<String, MediaError> {
        let format = upload.validate(self.max_bytes)?;
        let name = format!("{}-{}.{}", chrono::Utc::now().timestamp_millis(), Uuid::new_v4().simple(), format.extension());
        let path = self.dir.join(&name);
        std::fs::write(&path, &upload.bytes).map_err(|source| MediaError::Io { path: path.clone(), source })?;
        debug!(target: "lostfound::media", "stored upload original={:?} as='{}' bytes={}", upload.file_name, name, upload.bytes.len());
        Ok(format!("{PUBLIC_PREFIX}/{name}"))
    }

    fn remove(&self, reference: &str) -> Result<(), MediaError> {
        let Some(path) = self.file_for(reference) else {
            warn!(target: "lostfound::media", "ignoring removal of foreign reference '{}'", reference);
            return Ok(());
        };
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MediaError::Io { path, source }),
        }
    }
}
