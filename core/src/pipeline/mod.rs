//! Slicing pipeline: band planning, rendering, encoding, and thumbnail scaling.

pub mod resize;
pub mod slice;

pub use slice::{
    Band, EncodedSlice, SliceOptions, plan_bands, slice_count, slice_image,
    slice_image_with_progress, validate_slice_height,
};

pub type Result<T> = anyhow::Result<T>;
