//! Thumbnail downscaling built on top of `fast_image_resize`.

use anyhow::{anyhow, ensure};
use fast_image_resize as fir;

use crate::codec::DecodedImage;
use crate::types::ImageDimensions;

use super::Result;

/// Filtering kernels supported by the resizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
    /// Fastest option, mostly useful for tests.
    Nearest,
    Bilinear,
    /// Catmull-Rom bicubic interpolation.
    CatmullRom,
    /// Sharpest downscale; used for preview thumbnails.
    #[default]
    Lanczos3,
}

impl From<ResizeFilter> for fir::ResizeAlg {
    fn from(value: ResizeFilter) -> Self {
        use fir::FilterType;
        match value {
            ResizeFilter::Nearest => fir::ResizeAlg::Nearest,
            ResizeFilter::Bilinear => fir::ResizeAlg::Convolution(FilterType::Bilinear),
            ResizeFilter::CatmullRom => fir::ResizeAlg::Convolution(FilterType::CatmullRom),
            ResizeFilter::Lanczos3 => fir::ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }
}

/// Dimensions of `source` scaled so its longest edge is at most `longest`, keeping aspect ratio.
///
/// Images already within bounds are returned unchanged; no edge collapses below one pixel.
pub fn fit_longest_edge(source: ImageDimensions, longest: u32) -> ImageDimensions {
    let current = source.width.max(source.height);
    if current <= longest || current == 0 {
        return source;
    }

    let scale = f64::from(longest) / f64::from(current);
    let scaled = |edge: u32| ((f64::from(edge) * scale).round() as u32).clamp(1, longest);
    ImageDimensions::new(scaled(source.width), scaled(source.height))
}

/// Resize an RGBA8888 bitmap to `target`, premultiplying alpha while filtering.
pub fn resize_rgba(
    source: &DecodedImage,
    target: ImageDimensions,
    filter: ResizeFilter,
) -> Result<DecodedImage> {
    ensure!(source.width() > 0 && source.height() > 0, "source image has zero dimensions");
    ensure!(target.width > 0 && target.height > 0, "target dimensions must be non-zero");

    if source.dimensions == target {
        return Ok(source.clone());
    }

    ensure!(
        source.pixels().len() >= source.dimensions.rgba_len(),
        "source buffer is smaller than expected"
    );

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.pixels(),
        fir::PixelType::U8x4,
    )
    .map_err(|err| anyhow!("failed to prepare source image: {err}"))?;

    let mut dst_image = fir::images::Image::new(target.width, target.height, fir::PixelType::U8x4);

    let options = fir::ResizeOptions::new().resize_alg(filter.into()).use_alpha(true);

    fir::Resizer::new()
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|err| anyhow!("fast image resize failed: {err}"))?;

    Ok(DecodedImage { dimensions: target, pixels: dst_image.into_vec() })
}
