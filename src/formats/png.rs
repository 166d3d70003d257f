use super::be_u32;
use crate::types::ImageSize;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
pub const IHDR_CHUNK_TYPE: &[u8; 4] = b"IHDR";

pub const MIN_LENGTH: usize = 25;

/// IHDR is always the first chunk, so width and height sit at fixed offsets:
/// signature (8) + chunk length (4) + chunk type (4).
const IHDR_WIDTH_OFFSET: usize = 16;
const IHDR_HEIGHT_OFFSET: usize = 20;

#[inline]
pub fn decode(data: &[u8]) -> ImageSize {
    if data.len() < MIN_LENGTH {
        return ImageSize::ZERO;
    }
    match (
        be_u32(data, IHDR_WIDTH_OFFSET),
        be_u32(data, IHDR_HEIGHT_OFFSET),
    ) {
        (Some(width), Some(height)) => ImageSize::new(width, height),
        _ => ImageSize::ZERO,
    }
}
