//! Error taxonomy for the slicing pipeline.
//!
//! Every variant is terminal for the user action that raised it; nothing in the pipeline retries.
//! Each error carries an i18n key so the shell can surface it in the active language.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::i18n::Translate;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input: wrong type, oversized file, bad slice height, empty selection, wrong phase.
    Validation,
    /// Decoding or slicing failed; no partial slices are retained.
    Processing,
    /// Archive or document assembly failed; no partial file is delivered.
    Export,
    /// Configuration or filesystem problems outside the pipeline itself.
    Environment,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported file type `{mime}`")]
    UnsupportedType { mime: String },

    #[error("file is {size} bytes, the limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("slice height {height} is outside {min}..={max}")]
    InvalidSliceHeight { height: u32, min: u32, max: u32 },

    #[error("no slices are selected")]
    EmptySelection,

    #[error("no image is loaded")]
    NoImage,

    #[error("the image has not been sliced yet")]
    NotSliced,

    #[error("a slicing run is still in progress")]
    Busy,

    #[error("failed to decode image: {0:#}")]
    Decode(#[source] anyhow::Error),

    #[error("failed to slice image: {0:#}")]
    Processing(#[source] anyhow::Error),

    #[error("failed to build {format} export: {source:#}")]
    Export {
        format: crate::types::ExportFormat,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedType { .. }
            | Error::FileTooLarge { .. }
            | Error::InvalidSliceHeight { .. }
            | Error::EmptySelection
            | Error::NoImage
            | Error::NotSliced
            | Error::Busy => ErrorKind::Validation,
            Error::Decode(_) | Error::Processing(_) => ErrorKind::Processing,
            Error::Export { .. } => ErrorKind::Export,
            Error::Config(_) | Error::Io(..) => ErrorKind::Environment,
        }
    }

    /// Catalog key of the user-facing message for this error.
    pub fn message_key(&self) -> &'static str {
        match self {
            Error::UnsupportedType { .. } => "error.unsupported_type",
            Error::FileTooLarge { .. } => "error.file_too_large",
            Error::InvalidSliceHeight { .. } => "error.invalid_slice_height",
            Error::EmptySelection => "error.empty_selection",
            Error::NoImage => "error.no_image",
            Error::NotSliced => "error.not_sliced",
            Error::Busy => "error.busy",
            Error::Decode(_) => "error.decode",
            Error::Processing(_) => "error.processing",
            Error::Export { .. } => "error.export",
            Error::Config(_) => "error.config",
            Error::Io(..) => "error.io",
        }
    }

    fn message_params(&self) -> HashMap<&'static str, String> {
        let mut params = HashMap::new();
        match self {
            Error::UnsupportedType { mime } => {
                params.insert("type", mime.clone());
            }
            Error::FileTooLarge { size, limit } => {
                params.insert("size", megabytes(*size));
                params.insert("limit", megabytes(*limit));
            }
            Error::InvalidSliceHeight { height, min, max } => {
                params.insert("height", height.to_string());
                params.insert("min", min.to_string());
                params.insert("max", max.to_string());
            }
            Error::Decode(err) | Error::Processing(err) => {
                params.insert("detail", format!("{err:#}"));
            }
            Error::Export { format, source } => {
                params.insert("format", format.extension().to_ascii_uppercase());
                params.insert("detail", format!("{source:#}"));
            }
            Error::Config(detail) => {
                params.insert("detail", detail.clone());
            }
            Error::Io(path, err) => {
                params.insert("path", path.display().to_string());
                params.insert("detail", err.to_string());
            }
            Error::EmptySelection | Error::NoImage | Error::NotSliced | Error::Busy => {}
        }
        params
    }

    /// Render the user-facing message through the given translator.
    pub fn localized(&self, translator: &dyn Translate) -> String {
        translator.t(self.message_key(), &self.message_params())
    }
}

fn megabytes(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::{Catalog, Language};

    #[test]
    fn classifies_validation_errors() {
        assert_eq!(Error::EmptySelection.kind(), ErrorKind::Validation);
        assert_eq!(
            Error::InvalidSliceHeight { height: 5, min: 100, max: 5000 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(Error::Decode(anyhow::anyhow!("bad")).kind(), ErrorKind::Processing);
    }

    #[test]
    fn localizes_with_parameters() {
        let catalog = Catalog::new(Language::En);
        let err = Error::FileTooLarge { size: 60 * 1024 * 1024, limit: 50 * 1024 * 1024 };
        let message = err.localized(&catalog);
        assert!(message.contains("60.0"), "{message}");
        assert!(message.contains("50.0"), "{message}");
    }
}
