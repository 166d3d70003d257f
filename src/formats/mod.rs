//! Container sniffing and per-format header decoders.
//!
//! Every decoder is total: a buffer that is too short, malformed, or of an
//! unrecognised sub-variant yields `ImageSize::ZERO` rather than an error.

pub mod bmp;
pub mod gif;
pub mod jpeg;
pub mod png;
pub mod webp;

use crate::types::ImageSize;

pub use jpeg::JpegVariant;
pub use webp::WebpVariant;

/// Two-byte big-endian magic values at offset 0.
pub const JPEG_MAGIC: u16 = 0xFFD8;
pub const PNG_MAGIC: u16 = 0x8950;
pub const GIF_MAGIC: u16 = 0x4749;
pub const BMP_MAGIC: u16 = 0x424D;
/// "RI" of a RIFF container; WebP additionally needs "WEBP" at bytes 8..12.
pub const RIFF_MAGIC: u16 = 0x5249;
const RIFF_FORM_END: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Fewer than two bytes seen so far.
    Unknown,
    /// Magic bytes match nothing we decode. TIFF (`II`/`MM`) lands here too.
    Unsupported,
    Jpeg,
    Png,
    Gif,
    Bmp,
    WebP,
}

impl ImageFormat {
    /// Classifies a buffer by its leading magic bytes.
    pub fn classify(data: &[u8]) -> ImageFormat {
        let Some(header) = be_u16(data, 0) else {
            return ImageFormat::Unknown;
        };

        if header == RIFF_MAGIC {
            return match data.get(8..RIFF_FORM_END) {
                Some(tag) if tag.eq_ignore_ascii_case(b"WEBP") => ImageFormat::WebP,
                _ => ImageFormat::Unsupported,
            };
        }

        match header {
            JPEG_MAGIC => ImageFormat::Jpeg,
            PNG_MAGIC => ImageFormat::Png,
            GIF_MAGIC => ImageFormat::Gif,
            BMP_MAGIC => ImageFormat::Bmp,
            _ => ImageFormat::Unsupported,
        }
    }

    /// Like [`classify`](Self::classify), but answers `Unknown` while a RIFF
    /// container is still too short to show its form type.
    pub fn classify_prefix(data: &[u8]) -> ImageFormat {
        match be_u16(data, 0) {
            Some(RIFF_MAGIC) if data.len() < RIFF_FORM_END => ImageFormat::Unknown,
            _ => Self::classify(data),
        }
    }

    /// Smallest buffer for which header decoding is meaningful. JPEG has no
    /// fixed minimum because its segments must be walked.
    pub fn minimum_length(&self) -> Option<usize> {
        match self {
            ImageFormat::Png => Some(png::MIN_LENGTH),
            ImageFormat::Gif => Some(gif::MIN_LENGTH),
            ImageFormat::Bmp => Some(bmp::MIN_LENGTH),
            ImageFormat::WebP => Some(webp::MIN_LENGTH),
            ImageFormat::Jpeg | ImageFormat::Unknown | ImageFormat::Unsupported => None,
        }
    }

    /// True for formats that have a header decoder.
    #[inline]
    pub fn is_decodable(&self) -> bool {
        !matches!(self, ImageFormat::Unknown | ImageFormat::Unsupported)
    }

    /// Runs this format's header decoder over `data`.
    pub fn decode(&self, data: &[u8]) -> ImageSize {
        match self {
            ImageFormat::Jpeg => jpeg::decode(data),
            ImageFormat::Png => png::decode(data),
            ImageFormat::Gif => gif::decode(data),
            ImageFormat::Bmp => bmp::decode(data),
            ImageFormat::WebP => webp::decode(data),
            ImageFormat::Unknown | ImageFormat::Unsupported => ImageSize::ZERO,
        }
    }

    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ImageFormat::Jpeg => Some("jpg"),
            ImageFormat::Png => Some("png"),
            ImageFormat::Gif => Some("gif"),
            ImageFormat::Bmp => Some("bmp"),
            ImageFormat::WebP => Some("webp"),
            ImageFormat::Unknown | ImageFormat::Unsupported => None,
        }
    }
}

/// Classifies `data` and decodes it in one step.
pub fn probe(data: &[u8]) -> (ImageFormat, ImageSize) {
    let format = ImageFormat::classify(data);
    (format, format.decode(data))
}

#[inline]
pub(crate) fn be_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub(crate) fn le_u16(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

#[inline]
pub(crate) fn le_u24(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(3)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
}

#[inline]
pub(crate) fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[inline]
pub(crate) fn le_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Reads four bytes as ASCII, uppercased with spaces removed.
pub(crate) fn ascii_tag(data: &[u8], offset: usize) -> Option<String> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    if !bytes.is_ascii() {
        return None;
    }
    Some(
        bytes
            .iter()
            .filter(|&&b| b != b' ')
            .map(|b| b.to_ascii_uppercase() as char)
            .collect(),
    )
}
