use super::le_u16;
use crate::types::ImageSize;

pub const MIN_LENGTH: usize = 11;

/// Logical screen descriptor, little-endian.
const WIDTH_OFFSET: usize = 6;
const HEIGHT_OFFSET: usize = 8;

#[inline]
pub fn decode(data: &[u8]) -> ImageSize {
    if data.len() < MIN_LENGTH {
        return ImageSize::ZERO;
    }
    match (le_u16(data, WIDTH_OFFSET), le_u16(data, HEIGHT_OFFSET)) {
        (Some(width), Some(height)) => ImageSize::new(width as u32, height as u32),
        _ => ImageSize::ZERO,
    }
}
