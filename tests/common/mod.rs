#![allow(dead_code)]

use bytes::Bytes;
use headprobe::{BodyStream, BoxFuture, FetchRequest, Transport, TransportError};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Mutex;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
pub struct Resource {
    pub body: Vec<u8>,
    /// Size of each slice handed out by the body stream.
    pub slice: usize,
    pub status: u16,
    pub ignore_range: bool,
    /// The body never produces bytes.
    pub stall: bool,
    /// Only whole-resource fetches stall; ranged ones are served.
    pub stall_full: bool,
}

impl Resource {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            slice: 16,
            status: 200,
            ignore_range: false,
            stall: false,
            stall_full: false,
        }
    }

    pub fn sliced(mut self, slice: usize) -> Self {
        self.slice = slice.max(1);
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn ignoring_range(mut self) -> Self {
        self.ignore_range = true;
        self
    }

    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn stalled_when_full(mut self) -> Self {
        self.stall_full = true;
        self
    }
}

/// In-memory transport serving fixed bodies by URL.
#[derive(Default)]
pub struct ScriptedTransport {
    resources: HashMap<String, Resource>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: &str, resource: Resource) -> Self {
        self.resources.insert(url.to_string(), resource);
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn open(
        &self,
        request: FetchRequest,
    ) -> BoxFuture<'_, Result<Box<dyn BodyStream>, TransportError>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());

            let resource = self
                .resources
                .get(request.request.url().as_str())
                .cloned()
                .ok_or_else(|| TransportError::Other("connection refused".to_string()))?;
            if !(200..300).contains(&resource.status) {
                return Err(TransportError::Status(resource.status));
            }

            let mut body = resource.body;
            if let (Some(end), false) = (request.range_end, resource.ignore_range) {
                body.truncate(end as usize + 1);
            }
            let chunks = body
                .chunks(resource.slice)
                .map(Bytes::copy_from_slice)
                .collect::<VecDeque<_>>();

            Ok(Box::new(ScriptedBody {
                chunks,
                stall: resource.stall || (resource.stall_full && request.range_end.is_none()),
            }) as Box<dyn BodyStream>)
        })
    }
}

struct ScriptedBody {
    chunks: VecDeque<Bytes>,
    stall: bool,
}

impl BodyStream for ScriptedBody {
    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Option<Bytes>, TransportError>> {
        Box::pin(async move {
            if self.stall {
                std::future::pending::<()>().await;
            }
            Ok(self.chunks.pop_front())
        })
    }
}

pub fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 2, 0, 0, 0]);

    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&make_png_chunk(b"IHDR", &ihdr));
    data
}

pub fn make_png_chunk(chunk_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::new();
    chunk.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    chunk.extend_from_slice(chunk_type);
    chunk.extend_from_slice(payload);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(payload);
    chunk.extend_from_slice(&hasher.finalize().to_be_bytes());
    chunk
}

/// Encodes a blank RGB image with the `image` crate.
pub fn encode(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut encoded = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut encoded), format)
        .unwrap();
    encoded
}

/// A decodable JPEG whose frame header sits behind a `padding`-byte comment
/// inserted after the leading APP0 segment.
pub fn padded_jpeg(width: u32, height: u32, padding: usize) -> Vec<u8> {
    let jpeg = encode(width, height, image::ImageFormat::Jpeg);
    let first_segment_end = 4 + u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;

    let mut comment = vec![0xFF, 0xFE];
    comment.extend_from_slice(&((padding + 2) as u16).to_be_bytes());
    comment.extend(std::iter::repeat_n(b'x', padding));

    let mut padded = jpeg[..first_segment_end].to_vec();
    padded.extend_from_slice(&comment);
    padded.extend_from_slice(&jpeg[first_segment_end..]);
    padded
}

/// Minimal JFIF stream: APP0, `filler` segments, then SOF0.
pub fn jpeg_header(width: u16, height: u16, filler: &[usize]) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    data.extend_from_slice(b"JFIF\0");
    data.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
    for &len in filler {
        data.extend_from_slice(&[0xFF, 0xE1]);
        data.extend_from_slice(&((len + 2) as u16).to_be_bytes());
        data.extend(std::iter::repeat_n(0u8, len));
    }
    data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&[0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}
