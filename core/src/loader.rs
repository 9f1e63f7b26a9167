//! Upload validation and decoding.

use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use image::ImageFormat;
use tracing::{debug, info};

use crate::codec::{DecodedImage, decode_primary};
use crate::config::SlicerConfig;
use crate::error::Error;
use crate::types::ImageDimensions;

/// Raster types accepted for upload.
pub const ALLOWED_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp", "image/gif"];

/// A file handed over by the user, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    /// Declared media type; inferred from the name's extension when absent.
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), mime: None, bytes }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Effective media type: the declared one, normalised, or a guess from the extension.
    pub fn media_type(&self) -> String {
        match &self.mime {
            Some(mime) => normalize_mime(mime),
            None => guess_mime(Path::new(&self.name)).to_string(),
        }
    }
}

/// The decoded source bitmap owned by a session.
#[derive(Debug, Clone)]
pub struct OriginalImage {
    pub name: String,
    pub mime: String,
    pub byte_len: u64,
    pub bitmap: Arc<DecodedImage>,
}

impl OriginalImage {
    pub fn dimensions(&self) -> ImageDimensions {
        self.bitmap.dimensions
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }
}

/// Read a file from disk into an [`Upload`].
pub fn read_upload(path: &Path) -> Result<Upload, Error> {
    let bytes = fs::read(path).map_err(|err| Error::Io(path.to_path_buf(), err))?;
    let name = path
        .file_name()
        .and_then(OsStr::to_str)
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string());
    Ok(Upload::new(name, bytes))
}

/// Check type and size without decoding.
pub fn validate_upload(upload: &Upload, config: &SlicerConfig) -> Result<(), Error> {
    let mime = upload.media_type();
    if !ALLOWED_TYPES.contains(&mime.as_str()) {
        return Err(Error::UnsupportedType { mime });
    }

    if upload.size() > config.max_upload_bytes {
        return Err(Error::FileTooLarge { size: upload.size(), limit: config.max_upload_bytes });
    }

    Ok(())
}

/// Validate and decode an upload.
pub fn load_upload(upload: &Upload, config: &SlicerConfig) -> Result<OriginalImage, Error> {
    validate_upload(upload, config)?;

    let mime = upload.media_type();
    debug!(target: "loader", name = %upload.name, %mime, size = upload.size(), "decoding upload");

    let bitmap = decode_primary(&upload.name, format_for_mime(&mime), &upload.bytes)
        .map_err(Error::Decode)?;

    info!(
        target: "loader",
        name = %upload.name,
        dimensions = %bitmap.dimensions,
        "image loaded"
    );

    Ok(OriginalImage {
        name: upload.name.clone(),
        mime,
        byte_len: upload.size(),
        bitmap: Arc::new(bitmap),
    })
}

/// Read and load an image file in one step.
pub fn load_path(path: &Path, config: &SlicerConfig) -> Result<OriginalImage, Error> {
    load_upload(&read_upload(path)?, config)
}

pub fn guess_mime(path: &Path) -> &'static str {
    match path.extension().and_then(OsStr::to_str).map(str::to_ascii_lowercase).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

fn normalize_mime(mime: &str) -> String {
    let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => essence,
    }
}

fn format_for_mime(mime: &str) -> Option<ImageFormat> {
    match mime {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" => Some(ImageFormat::Jpeg),
        "image/webp" => Some(ImageFormat::WebP),
        "image/gif" => Some(ImageFormat::Gif),
        _ => None,
    }
}
