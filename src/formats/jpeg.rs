use super::{ascii_tag, be_u16};
use crate::types::ImageSize;

pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
pub const MARKER_PREFIX: u8 = 0xFF;

/// Offset of the first segment's length field (right after SOI + APPn marker).
const FIRST_SEGMENT_LENGTH: usize = 4;
/// Offset of the APP0/APP1 identifier ("JFIF" / "Exif").
const VARIANT_OFFSET: usize = 6;
const VARIANT_MIN_LENGTH: usize = 10;

const SOF_HEIGHT_OFFSET: usize = 5;
const SOF_WIDTH_OFFSET: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegVariant {
    Exif,
    Jfif,
    Unsupported,
}

impl JpegVariant {
    pub fn detect(data: &[u8]) -> JpegVariant {
        if data.len() < VARIANT_MIN_LENGTH {
            return JpegVariant::Unsupported;
        }
        match ascii_tag(data, VARIANT_OFFSET).as_deref() {
            Some("EXIF") => JpegVariant::Exif,
            Some("JFIF") => JpegVariant::Jfif,
            _ => JpegVariant::Unsupported,
        }
    }
}

/// Start-Of-Frame markers SOF0..SOF3 carry the frame dimensions.
#[inline]
pub fn is_sof_marker(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xC3)
}

/// Walks the marker segments until a Start-Of-Frame segment is found.
///
/// The walk starts at the first segment's length field and hops
/// `length` bytes at a time; every hop must land on a `0xFF` marker prefix.
/// Running off the end of `data` is not an error, it just means more bytes
/// are needed.
pub fn decode(data: &[u8]) -> ImageSize {
    if JpegVariant::detect(data) == JpegVariant::Unsupported {
        return ImageSize::ZERO;
    }
    walk_segments(data).unwrap_or(ImageSize::ZERO)
}

fn walk_segments(data: &[u8]) -> Option<ImageSize> {
    let mut pos = FIRST_SEGMENT_LENGTH;
    let mut segment_len = be_u16(data, pos)? as usize;

    loop {
        pos = pos.checked_add(segment_len)?;
        if pos >= data.len() {
            return None;
        }
        if data[pos] != MARKER_PREFIX {
            return None;
        }

        let marker = *data.get(pos + 1)?;
        if is_sof_marker(marker) {
            let height = be_u16(data, pos + SOF_HEIGHT_OFFSET)?;
            let width = be_u16(data, pos + SOF_WIDTH_OFFSET)?;
            return Some(ImageSize::new(width as u32, height as u32));
        }

        pos += 2;
        segment_len = be_u16(data, pos)? as usize;
    }
}
