//! Transport and full-decode seams.
//!
//! The fetch pipeline only needs "open a request, then pull byte chunks until
//! the body ends", plus an opaque whole-image decoder for the fallback path.
//! [`HttpTransport`] and [`ImageCrateDecoder`] are the production adapters;
//! tests plug in scripted implementations.

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::RANGE;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};

use crate::config::TransportSettings;
use crate::error::TransportError;
use crate::request::ImageRequest;
use crate::types::ImageSize;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One fetch as handed to a transport.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub request: ImageRequest,
    /// Inclusive last byte to request; `None` fetches the whole resource.
    pub range_end: Option<u64>,
    pub settings: TransportSettings,
}

impl FetchRequest {
    /// Value for the `Range` header, if this is a partial fetch.
    pub fn range_header(&self) -> Option<String> {
        self.range_end.map(|end| format!("bytes=0-{end}"))
    }
}

/// A response body delivered incrementally.
///
/// Dropping the stream abandons the transfer.
pub trait BodyStream: Send {
    /// Next slice of the body, `None` once the body has ended.
    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Option<Bytes>, TransportError>>;
}

/// Opens streaming fetches.
///
/// Implementations must honour the request's settings (user agent, timeout,
/// per-host connection limit) and report non-success statuses as errors.
pub trait Transport: Send + Sync {
    fn open(&self, request: FetchRequest)
    -> BoxFuture<'_, Result<Box<dyn BodyStream>, TransportError>>;
}

/// Decodes a complete image file to its dimensions.
pub trait FullDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Option<ImageSize>;
}

/// Full decode through the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl FullDecoder for ImageCrateDecoder {
    fn decode(&self, data: &[u8]) -> Option<ImageSize> {
        use image::GenericImageView;

        match image::load_from_memory(data) {
            Ok(image) => {
                let (width, height) = image.dimensions();
                Some(ImageSize::new(width, height))
            }
            Err(error) => {
                debug!(%error, bytes = data.len(), "full image decode failed");
                None
            }
        }
    }
}

struct HostLimit {
    max: usize,
    /// Permits still to be forgotten after a shrink; they were held by
    /// in-flight connections at the time.
    owed: usize,
    semaphore: Arc<Semaphore>,
}

impl HostLimit {
    fn new(max: usize) -> Self {
        Self {
            max,
            owed: 0,
            semaphore: Arc::new(Semaphore::new(max)),
        }
    }

    fn resize(&mut self, max: usize) {
        if max > self.max {
            let grow = max - self.max;
            let repaid = grow.min(self.owed);
            self.owed -= repaid;
            self.semaphore.add_permits(grow - repaid);
        } else {
            self.owed += self.max - max;
        }
        trace!(from = self.max, to = max, owed = self.owed, "host connection limit resized");
        self.max = max;
    }

    fn collect_owed(&mut self) {
        if self.owed > 0 {
            self.owed -= self.semaphore.forget_permits(self.owed);
        }
    }
}

/// reqwest-backed transport.
///
/// A client is built per request from that request's settings snapshot.
/// Concurrent connections are capped per `host:port` with a semaphore sized
/// from the snapshot. A changed limit resizes that semaphore in place, so
/// connections already open keep counting against it.
#[derive(Default)]
pub struct HttpTransport {
    hosts: Mutex<HashMap<String, HostLimit>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn host_semaphore(&self, host: &str, max: usize) -> Arc<Semaphore> {
        let mut hosts = self.hosts.lock();
        let limit = hosts
            .entry(host.to_string())
            .or_insert_with(|| HostLimit::new(max));
        if limit.max != max {
            limit.resize(max);
        }
        limit.collect_owed();
        Arc::clone(&limit.semaphore)
    }
}

fn host_key(request: &ImageRequest) -> String {
    let url = request.url();
    format!(
        "{}:{}",
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}

impl Transport for HttpTransport {
    fn open(
        &self,
        fetch: FetchRequest,
    ) -> BoxFuture<'_, Result<Box<dyn BodyStream>, TransportError>> {
        Box::pin(async move {
            let host = host_key(&fetch.request);
            let permit = self
                .host_semaphore(&host, fetch.settings.max_connections_per_host)
                .acquire_owned()
                .await
                .map_err(|_| TransportError::ConnectionLimit(host.clone()))?;

            let client = reqwest::Client::builder()
                .user_agent(fetch.settings.user_agent.as_str())
                .timeout(fetch.settings.timeout)
                .pool_max_idle_per_host(fetch.settings.max_connections_per_host)
                .build()?;

            let mut builder = client.get(fetch.request.url().clone());
            for (name, value) in fetch.request.headers() {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(range) = fetch.range_header() {
                builder = builder.header(RANGE, range);
            }

            let response = builder.send().await?;
            let status = response.status();
            trace!(url = %fetch.request.url(), %status, "response headers received");
            if !status.is_success() {
                return Err(TransportError::Status(status.as_u16()));
            }

            Ok(Box::new(HttpBody {
                response,
                _permit: permit,
            }) as Box<dyn BodyStream>)
        })
    }
}

struct HttpBody {
    response: reqwest::Response,
    _permit: OwnedSemaphorePermit,
}

impl BodyStream for HttpBody {
    fn next_chunk(&mut self) -> BoxFuture<'_, Result<Option<Bytes>, TransportError>> {
        Box::pin(async move { Ok(self.response.chunk().await?) })
    }
}
