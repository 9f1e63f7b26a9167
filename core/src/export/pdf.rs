//! PDF export: one page per slice, each page sized exactly to its slice.

use anyhow::{Context, anyhow};
use image::ImageFormat;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};

use crate::codec::flatten_alpha;
use crate::types::{Rgb, SliceEncoding};

use super::{ExportItem, Result};

const PDF_VERSION: &str = "1.5";
const IMAGE_NAME: &str = "Im0";

/// Lay out `items` as consecutive pages. Page units are image pixels.
///
/// Transparent pixels of PNG slices are flattened over `background`.
pub fn write_document(items: &[ExportItem], background: Rgb) -> Result<Vec<u8>> {
    let mut doc = Document::with_version(PDF_VERSION);
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(items.len());

    for item in items {
        let number = item.index.number();
        let width = i64::from(item.dimensions.width);
        let height = i64::from(item.dimensions.height);

        let image = image_xobject(item, background).with_context(|| format!("embedding slice {number}"))?;
        let image_id = doc.add_object(image);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(height),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|err| anyhow!("encoding page content for slice {number}: {err}"))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let mut xobjects = Dictionary::new();
        xobjects.set(IMAGE_NAME, image_id);

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(|err| anyhow!("serialising document: {err}"))?;
    Ok(bytes)
}

/// JPEG slices are embedded as-is; PNG slices are flattened to raw RGB samples.
fn image_xobject(item: &ExportItem, background: Rgb) -> Result<Stream> {
    let (filter, samples) = match item.encoding {
        SliceEncoding::Jpeg { .. } => (Some("DCTDecode"), item.bytes.to_vec()),
        SliceEncoding::Png => {
            let rgba = image::load_from_memory_with_format(&item.bytes, ImageFormat::Png)
                .context("decoding png slice")?
                .to_rgba8();
            (None, flatten_alpha(rgba.as_raw(), background))
        }
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(item.dimensions.width),
        "Height" => i64::from(item.dimensions.height),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => Object::Integer(8),
    };
    if let Some(filter) = filter {
        dict.set("Filter", Object::Name(filter.as_bytes().to_vec()));
    }

    let mut stream = Stream::new(dict, samples);
    stream.allows_compression = false;
    Ok(stream)
}
