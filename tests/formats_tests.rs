mod common;

use common::{encode, jpeg_header, png_header};
use headprobe::formats::{ImageFormat, JpegVariant, WebpVariant, probe};
use headprobe::{ChunkAccumulator, ImageSize};
use proptest::prelude::*;

const DECODABLE: [ImageFormat; 5] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::Bmp,
    ImageFormat::WebP,
];

fn gif_header(width: u16, height: u16) -> Vec<u8> {
    let mut data = b"GIF89a".to_vec();
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&[0xF7, 0x00, 0x00]);
    data
}

fn bmp_header(width: u32, height: u32) -> Vec<u8> {
    let mut data = b"BM".to_vec();
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(&40u32.to_le_bytes());
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    data.extend_from_slice(&[1, 0, 24, 0]);
    data.extend_from_slice(&[0u8; 24]);
    data
}

fn feed_in_steps(data: &[u8], step: usize) -> Option<ImageSize> {
    let mut acc = ChunkAccumulator::new();
    data.chunks(step).find_map(|slice| acc.push(slice))
}

#[test]
fn test_classify_short_buffers_are_unknown() {
    assert_eq!(ImageFormat::classify(&[]), ImageFormat::Unknown);
    assert_eq!(ImageFormat::classify(&[0xFF]), ImageFormat::Unknown);
    assert_eq!(ImageFormat::classify(&[0xFF, 0xD8]), ImageFormat::Jpeg);
}

#[test]
fn test_classify_tiff_is_unsupported() {
    assert_eq!(ImageFormat::classify(b"II*\0"), ImageFormat::Unsupported);
    assert_eq!(ImageFormat::classify(b"MM\0*"), ImageFormat::Unsupported);
}

#[test]
fn test_riff_without_webp_form_is_unsupported() {
    let mut wave = b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec();
    wave.extend_from_slice(&[0u8; 24]);
    assert_eq!(probe(&wave), (ImageFormat::Unsupported, ImageSize::ZERO));

    let mut lower = wave.clone();
    lower[8..12].copy_from_slice(b"webp");
    assert_eq!(ImageFormat::classify(&lower), ImageFormat::WebP);
}

#[test]
fn test_zeroed_buffers_yield_nothing() {
    for len in [0, 10, 16, 30, 31, 100] {
        let zeros = vec![0u8; len];
        assert_eq!(probe(&zeros).1, ImageSize::ZERO);
        assert_eq!(JpegVariant::detect(&zeros), JpegVariant::Unsupported);
        assert_eq!(WebpVariant::detect(&zeros), WebpVariant::Unsupported);
        for format in DECODABLE {
            assert_eq!(format.decode(&zeros), ImageSize::ZERO, "{format:?} at {len}");
        }
    }
}

#[test]
fn test_encoded_images_probe_to_their_size() {
    for format in [
        image::ImageFormat::Png,
        image::ImageFormat::Gif,
        image::ImageFormat::Bmp,
        image::ImageFormat::Jpeg,
        image::ImageFormat::WebP,
    ] {
        let data = encode(37, 21, format);
        let (_, size) = probe(&data);
        assert_eq!(size, ImageSize::new(37, 21), "{format:?}");
    }
}

#[test]
fn test_encoded_webp_is_lossless_vp8l() {
    let data = encode(300, 2, image::ImageFormat::WebP);
    assert_eq!(WebpVariant::detect(&data), WebpVariant::Vp8l);
    assert_eq!(probe(&data), (ImageFormat::WebP, ImageSize::new(300, 2)));
    assert_eq!(feed_in_steps(&data, 3), Some(ImageSize::new(300, 2)));
}

#[test]
fn test_png_byte_swapped_dimensions_differ() {
    let mut data = png_header(640, 480);
    assert_eq!(probe(&data).1, ImageSize::new(640, 480));
    data[16..20].reverse();
    data[20..24].reverse();
    assert_ne!(probe(&data).1, ImageSize::new(640, 480));
}

#[test]
fn test_gif_is_little_endian() {
    let mut data = gif_header(300, 2);
    assert_eq!(probe(&data).1, ImageSize::new(300, 2));
    data[6..8].reverse();
    assert_ne!(probe(&data).1, ImageSize::new(300, 2));
}

#[test]
fn test_jpeg_without_sof_is_zero() {
    let data = jpeg_header(64, 48, &[20, 30]);
    let sof = data.len() - 2 - 19;
    assert_eq!(probe(&data).1, ImageSize::new(64, 48));
    assert_eq!(probe(&data[..sof]).1, ImageSize::ZERO);
}

#[test]
fn test_jpeg_corrupt_segment_length_is_zero() {
    let mut data = jpeg_header(64, 48, &[20, 30]);
    // first filler segment's length field, pointed far past the end
    data[22..24].copy_from_slice(&0xFFF0u16.to_be_bytes());
    assert_eq!(probe(&data).1, ImageSize::ZERO);
}

proptest! {
    #[test]
    fn classify_is_total_and_pure(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        let first = ImageFormat::classify(&data);
        prop_assert_eq!(first, ImageFormat::classify(&data));
        if data.len() < 2 {
            prop_assert_eq!(first, ImageFormat::Unknown);
        } else {
            prop_assert_ne!(first, ImageFormat::Unknown);
        }
    }

    #[test]
    fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        for format in DECODABLE {
            let _ = format.decode(&data);
        }
        let _ = probe(&data);
    }

    #[test]
    fn truncated_headers_are_gated(width in 1u32..=u16::MAX as u32, height in 1u32..=u16::MAX as u32) {
        let cases = [
            (png_header(width, height), ImageFormat::Png),
            (gif_header(width as u16, height as u16), ImageFormat::Gif),
            (bmp_header(width, height), ImageFormat::Bmp),
        ];
        for (data, format) in cases {
            let min = format.minimum_length().unwrap();
            prop_assert_eq!(format.decode(&data[..min - 1]), ImageSize::ZERO);
            prop_assert_eq!(format.decode(&data), ImageSize::new(width, height));
        }
    }

    #[test]
    fn jpeg_walk_skips_any_segments(
        width in 1u16..,
        height in 1u16..,
        filler in proptest::collection::vec(0usize..600, 0..8),
    ) {
        let data = jpeg_header(width, height, &filler);
        prop_assert_eq!(probe(&data).1, ImageSize::new(width as u32, height as u32));
    }

    #[test]
    fn accumulator_converges_in_any_step(step in 1usize..40, width in 1u32..5000, height in 1u32..5000) {
        let png = png_header(width, height);
        let whole = probe(&png).1;
        prop_assert_eq!(feed_in_steps(&png, step), Some(whole));

        let jpeg = jpeg_header(width as u16, height as u16, &[50, 7]);
        let whole = probe(&jpeg).1;
        prop_assert_eq!(feed_in_steps(&jpeg, step), Some(whole));
    }
}
