//! Partition tall images into fixed-height horizontal bands and encode each band.

use anyhow::{Context, ensure};
use tracing::{debug, trace};

use crate::codec::{DecodedImage, EncodedImage, encode_rgba};
use crate::config::SlicerConfig;
use crate::error::Error;
use crate::types::{ImageDimensions, Rgb, SliceEncoding, SliceIndex};

use super::Result;

/// One horizontal band of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub index: SliceIndex,
    pub offset_y: u32,
    pub height: u32,
}

/// Parameters of one slicing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceOptions {
    pub slice_height: u32,
    pub encoding: SliceEncoding,
    pub background: Rgb,
}

impl SliceOptions {
    pub fn new(slice_height: u32) -> Self {
        Self { slice_height, encoding: SliceEncoding::default(), background: Rgb::default() }
    }

    /// Options for `slice_height` using the configured encoding and background.
    pub fn from_config(slice_height: u32, config: &SlicerConfig) -> Self {
        Self { slice_height, encoding: config.encoding, background: config.background }
    }

    pub fn encoding(mut self, encoding: SliceEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// An encoded band, ready to be displayed or exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSlice {
    pub band: Band,
    pub image: EncodedImage,
}

/// Number of bands `ceil(image_height / slice_height)`.
pub fn slice_count(image_height: u32, slice_height: u32) -> u32 {
    if slice_height == 0 { 0 } else { image_height.div_ceil(slice_height) }
}

/// Split `image_height` rows into contiguous bands of `slice_height`; the last may be shorter.
pub fn plan_bands(image_height: u32, slice_height: u32) -> Vec<Band> {
    (0..slice_count(image_height, slice_height))
        .map(|i| {
            let offset_y = i * slice_height;
            Band {
                index: SliceIndex(i),
                offset_y,
                height: slice_height.min(image_height - offset_y),
            }
        })
        .collect()
}

/// Reject slice heights outside the configured range.
pub fn validate_slice_height(height: u32, config: &SlicerConfig) -> std::result::Result<(), Error> {
    if (config.min_slice_height..=config.max_slice_height).contains(&height) {
        Ok(())
    } else {
        Err(Error::InvalidSliceHeight {
            height,
            min: config.min_slice_height,
            max: config.max_slice_height,
        })
    }
}

/// Render and encode every band. Any failure aborts the whole batch.
pub fn slice_image(source: &DecodedImage, options: &SliceOptions) -> Result<Vec<EncodedSlice>> {
    slice_image_with_progress(source, options, |_| {})
}

/// Like [`slice_image`], reporting a coarse completion percentage after every band.
pub fn slice_image_with_progress<F>(
    source: &DecodedImage,
    options: &SliceOptions,
    mut progress: F,
) -> Result<Vec<EncodedSlice>>
where
    F: FnMut(u8),
{
    ensure!(options.slice_height > 0, "slice height must be positive");
    ensure!(source.width() > 0 && source.height() > 0, "source image has zero dimensions");

    let bands = plan_bands(source.height(), options.slice_height);
    let total = bands.len();
    debug!(
        target: "pipeline::slice",
        dimensions = %source.dimensions,
        slice_height = options.slice_height,
        bands = total,
        "slicing image"
    );

    let mut slices = Vec::with_capacity(total);
    for (done, band) in bands.into_iter().enumerate() {
        let rows = source.rows(band.offset_y, band.height)?;
        let dimensions = ImageDimensions::new(source.width(), band.height);
        let image = encode_rgba(rows, dimensions, options.encoding, options.background)
            .with_context(|| format!("encoding slice {}", band.index.number()))?;
        trace!(target: "pipeline::slice", index = band.index.0, bytes = image.len(), "encoded band");
        slices.push(EncodedSlice { band, image });
        progress((((done + 1) * 100) / total) as u8);
    }

    Ok(slices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tall_image(width: u32, height: u32) -> DecodedImage {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            let shade = (y % 256) as u8;
            for _ in 0..width {
                pixels.extend_from_slice(&[shade, shade, shade, 255]);
            }
        }
        DecodedImage { dimensions: ImageDimensions::new(width, height), pixels }
    }

    #[test]
    fn last_band_takes_the_remainder() {
        let bands = plan_bands(2400, 900);
        let heights: Vec<u32> = bands.iter().map(|band| band.height).collect();
        assert_eq!(heights, vec![900, 900, 600]);
        assert_eq!(bands[2].offset_y, 1800);
    }

    #[test]
    fn exact_multiple_has_no_short_band() {
        let heights: Vec<u32> = plan_bands(2400, 800).iter().map(|band| band.height).collect();
        assert_eq!(heights, vec![800, 800, 800]);
    }

    #[test]
    fn bands_cover_the_image_for_every_height() {
        for image_height in [1, 99, 100, 101, 2399, 2400, 7777] {
            for slice_height in [100, 101, 333, 900, 5000] {
                let bands = plan_bands(image_height, slice_height);
                assert_eq!(bands.len() as u32, image_height.div_ceil(slice_height));
                assert_eq!(bands.iter().map(|band| band.height).sum::<u32>(), image_height);

                let (last, rest) = bands.split_last().unwrap();
                assert!(rest.iter().all(|band| band.height == slice_height));
                assert!(last.height >= 1 && last.height <= slice_height);
                assert_eq!(last.offset_y + last.height, image_height);
            }
        }
    }

    #[test]
    fn validates_configured_range() {
        let config = SlicerConfig::default();
        assert!(validate_slice_height(100, &config).is_ok());
        assert!(validate_slice_height(5000, &config).is_ok());
        assert!(matches!(
            validate_slice_height(99, &config),
            Err(Error::InvalidSliceHeight { height: 99, min: 100, max: 5000 })
        ));
        assert!(validate_slice_height(5001, &config).is_err());
    }

    #[test]
    fn encodes_one_image_per_band() {
        let image = tall_image(8, 250);
        let mut reported = Vec::new();
        let slices =
            slice_image_with_progress(&image, &SliceOptions::new(100), |p| reported.push(p))
                .expect("slice");

        assert_eq!(slices.len(), 3);
        assert!(slices.iter().all(|slice| slice.image.dimensions.width == 8));
        assert_eq!(slices[2].image.dimensions.height, 50);
        assert_eq!(reported, vec![33, 66, 100]);
    }

    #[test]
    fn png_slices_keep_exact_pixels() {
        let image = tall_image(2, 5);
        let slices =
            slice_image(&image, &SliceOptions::new(2).encoding(SliceEncoding::Png)).expect("slice");

        let decoded = image::load_from_memory(&slices[1].image.bytes).unwrap().into_rgba8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [2, 2, 2, 255]);
    }
}
