//! Core library of the long screenshot slicer.
//!
//! Load a tall image, cut it into fixed-height bands on a background worker, pick bands in a
//! preview grid, and export the picks as a ZIP archive or a PDF with one page per band.

#![deny(missing_debug_implementations)]

pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod i18n;
pub mod loader;
pub mod log;
pub mod pipeline;
pub mod preview;
pub mod selection;
pub mod session;
pub mod stats;
pub mod store;
pub mod types;
pub mod url;
pub mod worker;

pub type Result<T> = std::result::Result<T, Error>;

pub use config::SlicerConfig;
pub use error::{Error, ErrorKind};
pub use export::{DeliveredFile, DirectorySink, DownloadSink, ExportRequest, MemorySink};
pub use i18n::{Catalog, Language, Translate};
pub use loader::{OriginalImage, Upload};
pub use preview::{ClickTarget, ImageClick, PreviewAction, PreviewEntry, PreviewModel};
pub use selection::SelectionSet;
pub use session::{ImageSlice, Session, SessionPhase, SliceCompletion};
pub use types::{ExportFormat, ImageDimensions, RequestToken, Rgb, SliceEncoding, SliceIndex};
pub use url::{ObjectUrl, UrlRegistry};

/// Version of the core crate, reported by the shell.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_semver_version() {
        assert!(version().contains('.'));
    }
}
