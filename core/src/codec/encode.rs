//! Encoding of RGBA bands into compressed slice images.

use anyhow::{Context, ensure};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::types::{ImageDimensions, Rgb, SliceEncoding};

use super::Result;

/// JPEG cannot address images larger than this along either axis.
const JPEG_MAX_DIMENSION: u32 = u16::MAX as u32;

/// Compressed image bytes with the metadata needed to display or embed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub dimensions: ImageDimensions,
    pub encoding: SliceEncoding,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn mime(&self) -> &'static str {
        self.encoding.mime()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode an RGBA8888 buffer. Lossy encodings flatten transparency over `background`.
pub fn encode_rgba(
    pixels: &[u8],
    dimensions: ImageDimensions,
    encoding: SliceEncoding,
    background: Rgb,
) -> Result<EncodedImage> {
    ensure!(dimensions.width > 0 && dimensions.height > 0, "cannot encode an empty band");
    ensure!(
        pixels.len() == dimensions.rgba_len(),
        "band buffer holds {} bytes, expected {}",
        pixels.len(),
        dimensions.rgba_len()
    );

    let mut bytes = Vec::new();
    match encoding {
        SliceEncoding::Jpeg { quality } => {
            ensure!(
                dimensions.width <= JPEG_MAX_DIMENSION && dimensions.height <= JPEG_MAX_DIMENSION,
                "{dimensions} exceeds the JPEG size limit"
            );
            let rgb = flatten_alpha(pixels, background);
            JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
                .write_image(&rgb, dimensions.width, dimensions.height, ExtendedColorType::Rgb8)
                .context("encoding JPEG slice")?;
        }
        SliceEncoding::Png => {
            PngEncoder::new(&mut bytes)
                .write_image(pixels, dimensions.width, dimensions.height, ExtendedColorType::Rgba8)
                .context("encoding PNG slice")?;
        }
    }

    Ok(EncodedImage { dimensions, encoding, bytes })
}

/// Composite straight-alpha RGBA over an opaque background, producing packed RGB.
pub fn flatten_alpha(pixels: &[u8], background: Rgb) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
    for px in pixels.chunks_exact(4) {
        let alpha = u16::from(px[3]);
        for channel in 0..3 {
            let fg = u16::from(px[channel]);
            let bg = u16::from(background.0[channel]);
            let blended = (fg * alpha + bg * (255 - alpha) + 127) / 255;
            rgb.push(blended as u8);
        }
    }
    rgb
}
