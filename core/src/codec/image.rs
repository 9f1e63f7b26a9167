//! Decoding of uploaded images into straight-alpha RGBA bitmaps.

use std::io::Cursor;

use anyhow::{Context, anyhow, ensure};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder as _, ImageFormat, ImageReader, RgbaImage};
use moxcms::{CmsError, ColorProfile, Layout, TransformOptions};
use tracing::warn;

use crate::types::ImageDimensions;

use super::Result;

/// RGBA pixel buffer holding a decoded bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub dimensions: ImageDimensions,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Wrap an RGBA8888 buffer, checking its length against the dimensions.
    pub fn from_rgba(dimensions: ImageDimensions, pixels: Vec<u8>) -> Result<Self> {
        ensure!(
            pixels.len() == dimensions.rgba_len(),
            "pixel buffer holds {} bytes but {dimensions} needs {}",
            pixels.len(),
            dimensions.rgba_len()
        );
        Ok(Self { dimensions, pixels })
    }

    pub fn width(&self) -> u32 {
        self.dimensions.width
    }

    pub fn height(&self) -> u32 {
        self.dimensions.height
    }

    /// Returns a reference to the raw RGBA8888 pixel buffer.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Bytes per pixel row.
    pub fn stride(&self) -> usize {
        self.dimensions.width as usize * 4
    }

    /// Borrow the rows `offset_y..offset_y + height`.
    pub fn rows(&self, offset_y: u32, height: u32) -> Result<&[u8]> {
        let end_row = offset_y
            .checked_add(height)
            .filter(|end| *end <= self.height())
            .ok_or_else(|| {
                anyhow!("rows {offset_y}+{height} exceed image height {}", self.height())
            })?;
        let start = offset_y as usize * self.stride();
        let end = end_row as usize * self.stride();
        Ok(&self.pixels[start..end])
    }
}

/// Decode the primary frame of an uploaded image into an RGBA buffer.
///
/// Supports JPEG, PNG, WebP, and GIF (first frame). When `format` is `None` the format is sniffed
/// from the leading bytes. EXIF orientation is applied and embedded ICC profiles are converted to
/// sRGB; a failed colour conversion is logged and the unconverted pixels are kept.
pub fn decode_primary(label: &str, format: Option<ImageFormat>, data: &[u8]) -> Result<DecodedImage> {
    if data.is_empty() {
        return Err(anyhow!("empty image data for {label}"));
    }

    let reader = match format {
        Some(format) => ImageReader::with_format(Cursor::new(data), format),
        None => ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .context("guessing image format")?,
    };

    let mut decoder =
        reader.into_decoder().with_context(|| format!("constructing decoder for {label}"))?;

    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let icc_profile = decoder.icc_profile().unwrap_or(None);

    let mut image =
        DynamicImage::from_decoder(decoder).with_context(|| format!("decoding {label}"))?;

    if orientation != Orientation::NoTransforms {
        image.apply_orientation(orientation);
    }

    let mut rgba = image.into_rgba8();

    if let Some(profile) = icc_profile {
        if let Err(err) = convert_to_srgb_in_place(&mut rgba, &profile) {
            warn!(target: "codec::image", "failed to convert ICC profile for {label}: {err}");
        }
    }

    let dimensions = ImageDimensions::new(rgba.width(), rgba.height());
    ensure!(dimensions.width > 0 && dimensions.height > 0, "{label} has no pixels");

    Ok(DecodedImage { dimensions, pixels: rgba.into_raw() })
}

fn convert_to_srgb_in_place(image: &mut RgbaImage, profile_bytes: &[u8]) -> Result<()> {
    let source = ColorProfile::new_from_slice(profile_bytes)
        .map_err(|err| anyhow!("invalid ICC profile: {err}"))?;
    let srgb = ColorProfile::new_srgb();
    let raw = image.as_mut();

    match source.create_transform_8bit(Layout::Rgba, &srgb, Layout::Rgba, TransformOptions::default())
    {
        Ok(transform) => {
            let mut converted = vec![0u8; raw.len()];
            transform
                .transform(&raw[..], &mut converted)
                .map_err(|err| anyhow!("icc transform failed: {err}"))?;
            raw.copy_from_slice(&converted);
            Ok(())
        }
        // Some profiles only describe three channels; convert RGB and keep alpha as-is.
        Err(CmsError::InvalidLayout) => {
            let rgb: Vec<u8> = raw.chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]).collect();
            let mut converted = vec![0u8; rgb.len()];
            let transform = source.create_transform_8bit(
                Layout::Rgb,
                &srgb,
                Layout::Rgb,
                TransformOptions::default(),
            )?;
            transform
                .transform(&rgb, &mut converted)
                .map_err(|err| anyhow!("icc transform failed: {err}"))?;
            for (rgba_px, rgb_px) in raw.chunks_exact_mut(4).zip(converted.chunks_exact(3)) {
                rgba_px[..3].copy_from_slice(rgb_px);
            }
            Ok(())
        }
        Err(err) => Err(anyhow!("icc transform setup failed: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use moxcms::RenderingIntent;

    fn sample_image() -> RgbaImage {
        ImageBuffer::from_fn(2, 3, |x, y| match (x, y) {
            (0, 0) => Rgba([255, 0, 0, 255]),
            (1, 0) => Rgba([0, 255, 0, 255]),
            (0, _) => Rgba([0, 0, 255, 255]),
            _ => Rgba([255, 255, 0, 255]),
        })
    }

    fn encode(image: &RgbaImage, format: ImageFormat) -> Vec<u8> {
        let dynamic = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(image.clone()).into_rgb8()),
            _ => DynamicImage::ImageRgba8(image.clone()),
        };
        let mut cursor = Cursor::new(Vec::new());
        dynamic.write_to(&mut cursor, format).expect("encode sample");
        cursor.into_inner()
    }

    #[test]
    fn decodes_png_with_explicit_format() {
        let bytes = encode(&sample_image(), ImageFormat::Png);
        let decoded =
            decode_primary("shot.png", Some(ImageFormat::Png), &bytes).expect("decode png");

        assert_eq!(decoded.dimensions, ImageDimensions::new(2, 3));
        assert_eq!(decoded.pixels.len(), 24);
        assert_eq!(&decoded.pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn sniffs_format_when_unknown() {
        let bytes = encode(&sample_image(), ImageFormat::Jpeg);
        let decoded = decode_primary("upload", None, &bytes).expect("decode jpeg");
        assert_eq!(decoded.dimensions, ImageDimensions::new(2, 3));
    }

    #[test]
    fn decodes_webp_and_gif_first_frame() {
        for format in [ImageFormat::WebP, ImageFormat::Gif] {
            let bytes = encode(&sample_image(), format);
            let decoded = decode_primary("shot", Some(format), &bytes).expect("decode");
            assert_eq!(decoded.dimensions, ImageDimensions::new(2, 3), "{format:?}");
        }
    }

    #[test]
    fn rows_borrow_contiguous_band() {
        let decoded = DecodedImage::from_rgba(
            ImageDimensions::new(1, 3),
            vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3],
        )
        .unwrap();
        assert_eq!(decoded.rows(1, 2).unwrap(), &[2, 2, 2, 2, 3, 3, 3, 3]);
        assert!(decoded.rows(2, 2).is_err());
    }

    #[test]
    fn from_rgba_rejects_short_buffers() {
        let err = DecodedImage::from_rgba(ImageDimensions::new(2, 2), vec![0; 15]).unwrap_err();
        assert!(err.to_string().contains("needs 16"));
    }

    #[test]
    fn icc_conversion_preserves_alpha() {
        let mut image: RgbaImage = ImageBuffer::from_pixel(1, 1, Rgba([200, 100, 50, 128]));
        let mut profile = ColorProfile::new_display_p3();
        profile.rendering_intent = RenderingIntent::RelativeColorimetric;
        let icc_bytes = profile.encode().expect("encode profile");

        convert_to_srgb_in_place(&mut image, &icc_bytes).expect("icc conversion");

        let pixel = image.get_pixel(0, 0);
        assert_eq!(pixel[3], 128);
        assert_ne!(&pixel.0[..3], &[200, 100, 50]);
    }

    #[test]
    fn rejects_empty_input() {
        let err = decode_primary("empty.png", None, &[]).unwrap_err();
        assert!(err.to_string().contains("empty image data"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_primary("noise.png", Some(ImageFormat::Png), b"not a png").is_err());
    }
}
