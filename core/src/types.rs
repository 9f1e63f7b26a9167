//! Shared data structures exchanged between the core pipeline and the shell.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pixel dimensions of a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of bytes an RGBA8888 buffer of these dimensions occupies.
    pub fn rgba_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Zero-based position of a slice, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SliceIndex(pub u32);

impl SliceIndex {
    /// The 1-based number shown to users and used in archive entry names.
    pub fn number(self) -> u32 {
        self.0 + 1
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for SliceIndex {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for SliceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token identifying an in-flight slicing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Container format produced by the export manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Zip,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Zip => "zip",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Zip => "application/zip",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Compressed format each slice is encoded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum SliceEncoding {
    /// Lossy JPEG; `quality` is clamped to `1..=100`.
    Jpeg { quality: u8 },
    /// Lossless PNG.
    Png,
}

impl SliceEncoding {
    pub const DEFAULT_JPEG_QUALITY: u8 = 92;

    pub fn extension(self) -> &'static str {
        match self {
            SliceEncoding::Jpeg { .. } => "jpg",
            SliceEncoding::Png => "png",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            SliceEncoding::Jpeg { .. } => "image/jpeg",
            SliceEncoding::Png => "image/png",
        }
    }
}

impl Default for SliceEncoding {
    fn default() -> Self {
        SliceEncoding::Jpeg { quality: Self::DEFAULT_JPEG_QUALITY }
    }
}

/// Opaque RGB color used to flatten transparency before lossy encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgb(pub [u8; 3]);

impl Default for Rgb {
    fn default() -> Self {
        Rgb([255, 255, 255])
    }
}
