//! WebP header decoding.
//!
//! Dimensions are read straight from the first chunk of the RIFF container
//! (`VP8 `, `VP8L` or `VP8X`), so a partial buffer is enough and no bitmap is
//! ever decoded.

use super::{ascii_tag, le_u16, le_u24, le_u32};
use crate::types::ImageSize;

/// Decoding needs strictly more than this many bytes.
pub const MIN_LENGTH: usize = 30;

const CHUNK_TAG_OFFSET: usize = 12;
const VARIANT_MIN_LENGTH: usize = 16;
const PAYLOAD_OFFSET: usize = 20;

const VP8_START_CODE: [u8; 3] = [0x9D, 0x01, 0x2A];
const VP8_DIMENSION_MASK: u16 = 0x3FFF;
const VP8L_SIGNATURE: u8 = 0x2F;
const VP8L_DIMENSION_MASK: u32 = 0x3FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebpVariant {
    /// Extended format with a canvas header.
    Vp8x,
    /// Lossless bitstream.
    Vp8l,
    /// Lossy bitstream.
    Vp8,
    Unsupported,
}

impl WebpVariant {
    pub fn detect(data: &[u8]) -> WebpVariant {
        if data.len() < VARIANT_MIN_LENGTH {
            return WebpVariant::Unsupported;
        }
        match ascii_tag(data, CHUNK_TAG_OFFSET).as_deref() {
            Some("VP8X") => WebpVariant::Vp8x,
            Some("VP8L") => WebpVariant::Vp8l,
            Some("VP8") => WebpVariant::Vp8,
            _ => WebpVariant::Unsupported,
        }
    }
}

pub fn decode(data: &[u8]) -> ImageSize {
    if data.len() <= MIN_LENGTH {
        return ImageSize::ZERO;
    }
    let size = match WebpVariant::detect(data) {
        WebpVariant::Vp8x => decode_vp8x(data),
        WebpVariant::Vp8l => decode_vp8l(data),
        WebpVariant::Vp8 => decode_vp8(data),
        WebpVariant::Unsupported => None,
    };
    size.unwrap_or(ImageSize::ZERO)
}

fn decode_vp8x(data: &[u8]) -> Option<ImageSize> {
    // flags (1) + reserved (3), then 24-bit canvas width-1 and height-1
    let width = le_u24(data, PAYLOAD_OFFSET + 4)? + 1;
    let height = le_u24(data, PAYLOAD_OFFSET + 7)? + 1;
    Some(ImageSize::new(width, height))
}

fn decode_vp8l(data: &[u8]) -> Option<ImageSize> {
    if *data.get(PAYLOAD_OFFSET)? != VP8L_SIGNATURE {
        return None;
    }
    let bits = le_u32(data, PAYLOAD_OFFSET + 1)?;
    let width = (bits & VP8L_DIMENSION_MASK) + 1;
    let height = ((bits >> 14) & VP8L_DIMENSION_MASK) + 1;
    Some(ImageSize::new(width, height))
}

fn decode_vp8(data: &[u8]) -> Option<ImageSize> {
    // 3-byte frame tag precedes the start code
    if data.get(PAYLOAD_OFFSET + 3..PAYLOAD_OFFSET + 6)? != &VP8_START_CODE[..] {
        return None;
    }
    let width = le_u16(data, PAYLOAD_OFFSET + 6)? & VP8_DIMENSION_MASK;
    let height = le_u16(data, PAYLOAD_OFFSET + 8)? & VP8_DIMENSION_MASK;
    Some(ImageSize::new(width as u32, height as u32))
}
