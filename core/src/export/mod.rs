//! Assembly of selected slices into a downloadable file.
//!
//! An [`ExportRequest`] snapshots the selected slices in ascending index order. The ZIP and PDF
//! writers only read the request, so the session stays untouched whether an export succeeds or
//! fails.

pub mod archive;
pub mod pdf;
pub mod sink;

use std::sync::Arc;

use crate::error::Error;
use crate::session::Session;
use crate::types::{ExportFormat, ImageDimensions, Rgb, SliceEncoding, SliceIndex};

pub use sink::{DeliveredFile, DirectorySink, DownloadSink, MemorySink};

pub type Result<T> = anyhow::Result<T>;

/// Characters stripped from user-supplied file names.
const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// One selected slice as seen by the writers.
#[derive(Debug, Clone)]
pub struct ExportItem {
    pub index: SliceIndex,
    pub dimensions: ImageDimensions,
    pub encoding: SliceEncoding,
    pub bytes: Arc<[u8]>,
}

impl ExportItem {
    /// Archive entry name, numbered by the slice's original position.
    pub fn entry_name(&self) -> String {
        format!("slice_{}.{}", self.index.number(), self.encoding.extension())
    }
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub file_name: String,
    pub items: Vec<ExportItem>,
    /// Colour transparent PNG pixels are flattened over when a writer needs opaque samples.
    pub background: Rgb,
}

impl ExportRequest {
    /// Snapshot the session's selection for export as `format`.
    pub fn from_session(
        session: &Session,
        format: ExportFormat,
        file_name: &str,
    ) -> std::result::Result<Self, Error> {
        if session.slices().is_empty() {
            return Err(Error::NotSliced);
        }

        let items: Vec<ExportItem> = session
            .selection()
            .iter()
            .filter_map(|index| session.slice(index))
            .map(|slice| ExportItem {
                index: slice.index,
                dimensions: slice.dimensions,
                encoding: slice.encoding,
                bytes: slice.shared_bytes(),
            })
            .collect();
        if items.is_empty() {
            return Err(Error::EmptySelection);
        }

        let config = session.config();
        let file_name = output_file_name(file_name, &config.default_output_name, format);
        Ok(Self { format, file_name, items, background: config.background })
    }
}

/// Produce the bytes of the requested file.
pub fn build(request: &ExportRequest) -> std::result::Result<Vec<u8>, Error> {
    if request.items.is_empty() {
        return Err(Error::EmptySelection);
    }
    let bytes = match request.format {
        ExportFormat::Zip => archive::write_archive(&request.items),
        ExportFormat::Pdf => pdf::write_document(&request.items, request.background),
    };
    bytes.map_err(|source| Error::Export { format: request.format, source })
}

/// Clean a user-entered name and give it the extension of `format`.
///
/// Reserved and control characters are dropped; a blank result falls back to `default_stem`.
pub fn output_file_name(input: &str, default_stem: &str, format: ExportFormat) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_control() && !RESERVED_CHARS.contains(c))
        .collect();
    let mut stem = cleaned.trim().trim_end_matches('.').trim_end();

    let suffix = format!(".{}", format.extension());
    if stem.to_ascii_lowercase().ends_with(&suffix) {
        stem = &stem[..stem.len() - suffix.len()];
    }
    stem = stem.trim().trim_matches('.').trim();
    if stem.is_empty() {
        stem = default_stem;
    }
    format!("{stem}{suffix}")
}
