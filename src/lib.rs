pub mod accumulator;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod io;
pub mod request;
pub mod types;

pub use accumulator::ChunkAccumulator;
pub use config::{ExtractConfig, TransportSettings};
pub use error::{ExtractError, Result, TransportError};
pub use extract::{Extraction, Extractor};
pub use fetch::{FetchMode, FetchRegistry, FetchTask, Outcome, TaskContext, TaskState};
pub use formats::{ImageFormat, probe};
pub use io::{BodyStream, BoxFuture, FetchRequest, FullDecoder, HttpTransport, ImageCrateDecoder, Transport};
pub use request::{ImageRequest, RequestSource};
pub use types::{ChunkSize, ExtractOptions, ImageSize};
