use bytes::BytesMut;

use crate::formats::ImageFormat;
use crate::types::ImageSize;

/// Growing header buffer for one in-flight fetch.
///
/// Each received slice is appended and the whole buffer re-decoded until a
/// non-zero size appears. The format is sniffed once, as soon as enough
/// leading bytes are available to tell containers apart.
#[derive(Debug)]
pub struct ChunkAccumulator {
    buffer: BytesMut,
    format: ImageFormat,
}

impl ChunkAccumulator {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            format: ImageFormat::Unknown,
        }
    }

    /// Appends `slice` and returns the decoded size once the header is complete.
    pub fn push(&mut self, slice: &[u8]) -> Option<ImageSize> {
        self.buffer.extend_from_slice(slice);

        if self.format == ImageFormat::Unknown {
            self.format = ImageFormat::classify_prefix(&self.buffer);
        }
        if !self.format.is_decodable() {
            return None;
        }

        let size = self.format.decode(&self.buffer);
        (!size.is_zero()).then_some(size)
    }

    #[inline]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// No amount of further bytes will produce a size.
    #[inline]
    pub fn is_unsupported(&self) -> bool {
        self.format == ImageFormat::Unsupported
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for ChunkAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
