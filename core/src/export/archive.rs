//! ZIP export.

use std::io::{Cursor, Write};

use anyhow::Context;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{ExportItem, Result};

/// Write `items` into an archive, one entry per slice, in the given order.
///
/// Slices are already compressed images, so entries are stored rather than deflated.
pub fn write_archive(items: &[ExportItem]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    for item in items {
        let name = item.entry_name();
        writer.start_file(name.as_str(), options).with_context(|| format!("starting entry {name}"))?;
        writer.write_all(&item.bytes).with_context(|| format!("writing entry {name}"))?;
    }

    let cursor = writer.finish().context("finalising archive")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::Arc;

    use zip::ZipArchive;

    use super::*;
    use crate::types::{ImageDimensions, SliceEncoding, SliceIndex};

    fn item(index: u32, bytes: &[u8]) -> ExportItem {
        ExportItem {
            index: SliceIndex(index),
            dimensions: ImageDimensions::new(1, 1),
            encoding: SliceEncoding::default(),
            bytes: Arc::from(bytes.to_vec()),
        }
    }

    #[test]
    fn entries_keep_original_numbers_and_bytes() {
        let bytes = write_archive(&[item(0, b"first"), item(2, b"third")]).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let names: Vec<String> = archive.file_names().map(str::to_owned).collect();
        assert!(names.contains(&"slice_1.jpg".to_string()));
        assert!(names.contains(&"slice_3.jpg".to_string()));

        let mut content = Vec::new();
        archive.by_name("slice_3.jpg").unwrap().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"third");
    }

    #[test]
    fn entry_order_follows_item_order() {
        let bytes = write_archive(&[item(1, b"a"), item(4, b"b")]).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "slice_2.jpg");
        assert_eq!(archive.by_index(1).unwrap().name(), "slice_5.jpg");
    }
}
