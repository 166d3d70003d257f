use serde::{Deserialize, Serialize};

/// Width and height of an image in pixels.
///
/// `ImageSize::ZERO` doubles as "not determined yet" and "could not be
/// determined"; callers that need to tell the two apart look at the
/// accompanying completion flag instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const ZERO: ImageSize = ImageSize {
        width: 0,
        height: 0,
    };

    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Rescales to `preferred_width`, keeping the aspect ratio and clamping the
    /// height to `max_height`. A zero size stays zero.
    pub fn scaled_to_width(&self, preferred_width: f64, max_height: f64) -> ImageSize {
        if self.is_zero() {
            return ImageSize::ZERO;
        }
        let height = (self.height as f64 * preferred_width) / self.width as f64;
        ImageSize {
            width: clamp_to_u32(preferred_width.round()),
            height: clamp_to_u32(height.min(max_height).round()),
        }
    }
}

impl From<(u32, u32)> for ImageSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

fn clamp_to_u32(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= u32::MAX as f64 {
        u32::MAX
    } else {
        value as u32
    }
}

/// How many leading bytes to request with the initial ranged fetch.
///
/// JPEG headers carry variable-length metadata ahead of the frame header, so
/// the small preset is enough for PNG, GIF, BMP and WebP but may miss the
/// dimensions of a JPEG with large EXIF or ICC segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkSize {
    /// 100 bytes
    #[default]
    Small,
    /// 1,000 bytes
    Medium,
    /// 10,000 bytes
    Large,
    /// 50,000 bytes
    ExtraLarge,
    /// 100,000 bytes
    Huge,
}

impl ChunkSize {
    pub const ALL: [ChunkSize; 5] = [
        ChunkSize::Small,
        ChunkSize::Medium,
        ChunkSize::Large,
        ChunkSize::ExtraLarge,
        ChunkSize::Huge,
    ];

    #[inline]
    pub const fn bytes(self) -> u64 {
        match self {
            ChunkSize::Small => 100,
            ChunkSize::Medium => 1_000,
            ChunkSize::Large => 10_000,
            ChunkSize::ExtraLarge => 50_000,
            ChunkSize::Huge => 100_000,
        }
    }
}

/// Per-call options for an extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Overrides the configured chunk size for this call.
    pub chunk_size: Option<ChunkSize>,
    /// Download the whole resource and decode it when the header chunk does
    /// not yield a size.
    pub download_on_failure: bool,
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: ChunkSize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_download_on_failure(mut self, enabled: bool) -> Self {
        self.download_on_failure = enabled;
        self
    }
}
