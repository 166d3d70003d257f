use std::io;
use thiserror::Error;

/// Failures inside the fetch/decode pipeline.
///
/// None of these cross the public extraction API: they are logged and folded
/// into a zero size. They surface as values only from constructors and from
/// the lower-level building blocks.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Unsupported image format")]
    FormatUnsupported,

    #[error("Malformed header after {bytes} bytes")]
    MalformedHeader { bytes: usize },

    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] io::Error),

    #[error("Fetch cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Connection limiter closed for host {0}")]
    ConnectionLimit(String),

    #[error("Transport error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
