use super::{le_u16, le_u32};
use crate::types::ImageSize;

pub const MIN_LENGTH: usize = 29;

const DIB_HEADER_SIZE_OFFSET: usize = 14;
const WIDTH_OFFSET: usize = 18;
/// BITMAPINFOHEADER; anything else is treated as the OS/2 core header with
/// 16-bit dimensions.
const WINDOWS_INFO_HEADER_SIZE: u32 = 40;

pub fn decode(data: &[u8]) -> ImageSize {
    if data.len() < MIN_LENGTH {
        return ImageSize::ZERO;
    }
    let Some(header_size) = le_u32(data, DIB_HEADER_SIZE_OFFSET) else {
        return ImageSize::ZERO;
    };

    let dimensions = if header_size == WINDOWS_INFO_HEADER_SIZE {
        le_u32(data, WIDTH_OFFSET).zip(le_u32(data, WIDTH_OFFSET + 4))
    } else {
        le_u16(data, WIDTH_OFFSET)
            .zip(le_u16(data, WIDTH_OFFSET + 2))
            .map(|(w, h)| (w as u32, h as u32))
    };

    dimensions
        .map(|(width, height)| ImageSize::new(width, height))
        .unwrap_or(ImageSize::ZERO)
}
