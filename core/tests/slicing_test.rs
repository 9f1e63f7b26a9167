use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use shotslice_core::codec::{DecodedImage, decode_primary};
use shotslice_core::pipeline::{SliceOptions, plan_bands, slice_count, slice_image_with_progress};
use shotslice_core::types::{ImageDimensions, SliceEncoding};

fn striped(width: u32, height: u32) -> DecodedImage {
    let image = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_fn(width, height, |_, y| {
        let shade = if (y / 10) % 2 == 0 { 20 } else { 230 };
        Rgba([shade, shade, shade, 255])
    });
    DecodedImage { dimensions: ImageDimensions::new(width, height), pixels: image.into_raw() }
}

#[test]
fn bands_cover_every_row_exactly_once() {
    for (height, slice) in [(1u32, 100u32), (99, 100), (100, 100), (101, 100), (2400, 900), (5000, 123)] {
        let bands = plan_bands(height, slice);
        assert_eq!(bands.len() as u32, slice_count(height, slice));
        assert_eq!(bands.iter().map(|band| band.height).sum::<u32>(), height);

        let mut expected_offset = 0;
        for (position, band) in bands.iter().enumerate() {
            assert_eq!(band.index.0 as usize, position);
            assert_eq!(band.offset_y, expected_offset);
            assert!(band.height >= 1 && band.height <= slice);
            expected_offset += band.height;
        }
        let (last, rest) = bands.split_last().unwrap();
        assert!(rest.iter().all(|band| band.height == slice));
        assert!(last.height <= slice);
    }
}

#[test]
fn png_slices_reproduce_source_rows() {
    let source = striped(16, 45);
    let options = SliceOptions::new(20).encoding(SliceEncoding::Png);
    let slices = slice_image_with_progress(&source, &options, |_| {}).expect("slice");
    assert_eq!(slices.len(), 3);

    for slice in &slices {
        let decoded = decode_primary("slice", Some(ImageFormat::Png), &slice.image.bytes).expect("decode");
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), slice.band.height);
        let expected = source.rows(slice.band.offset_y, slice.band.height).unwrap();
        assert_eq!(decoded.pixels(), expected);
    }
}

#[test]
fn jpeg_slices_keep_dimensions() {
    let source = striped(40, 95);
    let slices = slice_image_with_progress(&source, &SliceOptions::new(30), |_| {}).expect("slice");
    let heights: Vec<u32> = slices
        .iter()
        .map(|slice| {
            let decoded = image::load_from_memory_with_format(&slice.image.bytes, ImageFormat::Jpeg)
                .expect("jpeg");
            assert_eq!(decoded.width(), 40);
            decoded.height()
        })
        .collect();
    assert_eq!(heights, vec![30, 30, 30, 5]);
}

#[test]
fn progress_reaches_one_hundred_monotonically() {
    let source = striped(4, 70);
    let mut reported = Vec::new();
    slice_image_with_progress(&source, &SliceOptions::new(10), |percent| reported.push(percent)).unwrap();
    assert_eq!(reported.len(), 7);
    assert!(reported.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(reported.last(), Some(&100));
}

#[test]
fn decoded_uploads_slice_like_raw_bitmaps() {
    let image = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(8, 25, Rgba([10, 20, 30, 255])));
    let mut encoded = Cursor::new(Vec::new());
    image.write_to(&mut encoded, ImageFormat::Png).unwrap();

    let decoded = decode_primary("upload.png", None, encoded.get_ref()).unwrap();
    let slices = slice_image_with_progress(&decoded, &SliceOptions::new(10), |_| {}).unwrap();
    assert_eq!(slices.iter().map(|s| s.band.height).collect::<Vec<_>>(), vec![10, 10, 5]);
}
