//! Image decoding and slice encoding primitives.

pub mod encode;
pub mod image;

pub use self::encode::{EncodedImage, encode_rgba, flatten_alpha};
pub use self::image::{DecodedImage, decode_primary};

/// Codec helpers report through `anyhow` so callers can attach context before classifying.
pub type Result<T> = anyhow::Result<T>;
