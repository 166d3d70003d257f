//! Public entry point.
//!
//! An [`Extractor`] owns a small tokio runtime, the transport and decoder, a
//! registry of asynchronous fetches, and the current [`ExtractConfig`].
//! Every call starts with a ranged header fetch; when that yields no size and
//! the caller asked for it, a full download plus full decode follows.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::config::ExtractConfig;
use crate::error::Result;
use crate::fetch::{FetchMode, FetchRegistry, FetchTask, Outcome, TaskContext, TaskState};
use crate::io::{FullDecoder, HttpTransport, ImageCrateDecoder, Transport};
use crate::request::{ImageRequest, RequestSource, identity_of};
use crate::types::{ChunkSize, ExtractOptions, ImageSize};

/// Result of an extraction with its completion flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Normalized URL, or the raw input when it never formed a request.
    pub url: String,
    pub size: ImageSize,
    /// `true` only when a size was actually determined.
    pub finished: bool,
}

impl Extraction {
    fn unresolved(url: String) -> Self {
        Self {
            url,
            size: ImageSize::ZERO,
            finished: false,
        }
    }
}

impl From<Outcome> for Extraction {
    fn from(outcome: Outcome) -> Self {
        Self {
            finished: outcome.is_success(),
            url: outcome.url,
            size: outcome.size,
        }
    }
}

type Completion = Box<dyn FnOnce(String, ImageSize) + Send + 'static>;

struct Shared {
    context: TaskContext,
    registry: FetchRegistry,
    config: RwLock<ExtractConfig>,
}

impl Shared {
    fn task(&self, request: &ImageRequest, mode: FetchMode) -> Arc<FetchTask> {
        let settings = self.config.read().transport_settings();
        FetchTask::new(request.clone(), mode, settings)
    }

    fn header_mode(&self, options: ExtractOptions) -> FetchMode {
        FetchMode::Header(options.chunk_size.unwrap_or(self.config.read().chunk_size))
    }

    fn spawn_header(self: &Arc<Self>, request: &ImageRequest, options: ExtractOptions, completion: Completion) {
        let task = self.task(request, self.header_mode(options));
        // The full download is linked up front so cancelling by url reaches
        // it while the header task is settling.
        if options.download_on_failure {
            task.chain(self.task(request, FetchMode::Full));
        }
        self.registry.add(Arc::clone(&task));

        let shared = Arc::clone(self);
        let follow_up = task.follow_up();
        task.start(&self.context, move |outcome| match follow_up {
            Some(full) if wants_fallback(&outcome, options) => {
                debug!(url = %outcome.url, "header fetch gave no size, downloading full image");
                shared.registry.add(Arc::clone(&full));
                shared.registry.remove_settled();
                shared.start_full(&full, completion);
            }
            follow_up => {
                if let Some(full) = follow_up {
                    full.cancel();
                }
                shared.registry.remove_settled();
                completion(outcome.url, outcome.size);
            }
        });
    }

    fn start_full(self: &Arc<Self>, task: &Arc<FetchTask>, completion: Completion) {
        let shared = Arc::clone(self);
        task.start(&self.context, move |outcome| {
            shared.registry.remove_settled();
            completion(outcome.url, outcome.size);
        });
    }
}

fn wants_fallback(outcome: &Outcome, options: ExtractOptions) -> bool {
    options.download_on_failure && !outcome.is_success() && outcome.state != TaskState::Cancelled
}

/// Determines image dimensions from remote files.
///
/// ```no_run
/// use headprobe::{ExtractOptions, Extractor};
///
/// let extractor = Extractor::new()?;
/// let size = extractor.extract("https://example.com/photo.png", ExtractOptions::default());
/// println!("{size}");
/// # Ok::<(), headprobe::ExtractError>(())
/// ```
///
/// The blocking methods must not be called from inside a tokio runtime; use
/// the `_async` variants there.
pub struct Extractor {
    shared: Arc<Shared>,
    runtime: Option<Runtime>,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Self::with_config(ExtractConfig::default())
    }

    pub fn with_config(config: ExtractConfig) -> Result<Self> {
        Self::with_parts(config, Arc::new(HttpTransport::new()), Arc::new(ImageCrateDecoder))
    }

    /// Builds an extractor around a custom transport and full decoder.
    pub fn with_parts(
        config: ExtractConfig,
        transport: Arc<dyn Transport>,
        decoder: Arc<dyn FullDecoder>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("headprobe-io")
            .enable_all()
            .build()?;

        let shared = Arc::new(Shared {
            context: TaskContext::new(runtime.handle().clone(), transport, decoder),
            registry: FetchRegistry::new(),
            config: RwLock::new(config),
        });

        Ok(Self {
            shared,
            runtime: Some(runtime),
        })
    }

    /// Blocks until the size is known or could not be determined.
    pub fn extract<R: RequestSource + ?Sized>(&self, request: &R, options: ExtractOptions) -> ImageSize {
        self.extract_with_status(request, options).size
    }

    /// Like [`extract`](Self::extract), also reporting whether a size was found.
    pub fn extract_with_status<R: RequestSource + ?Sized>(
        &self,
        request: &R,
        options: ExtractOptions,
    ) -> Extraction {
        let Some(request) = request.to_request() else {
            debug!(input = %identity_of(request), "not a fetchable request");
            return Extraction::unresolved(identity_of(request));
        };

        let shared = &self.shared;
        let outcome = shared
            .task(&request, shared.header_mode(options))
            .start_blocking(&shared.context);
        if !wants_fallback(&outcome, options) {
            return outcome.into();
        }

        debug!(url = %outcome.url, "header fetch gave no size, downloading full image");
        shared
            .task(&request, FetchMode::Full)
            .start_blocking(&shared.context)
            .into()
    }

    /// Starts an extraction and returns immediately. `completion` receives the
    /// request's URL string and the size, exactly once, on a runtime thread
    /// (or on the calling thread when the request is invalid).
    pub fn extract_async<R, F>(&self, request: &R, options: ExtractOptions, completion: F)
    where
        R: RequestSource + ?Sized,
        F: FnOnce(String, ImageSize) + Send + 'static,
    {
        match request.to_request() {
            Some(request) => self.shared.spawn_header(&request, options, Box::new(completion)),
            None => {
                debug!(input = %identity_of(request), "not a fetchable request");
                completion(identity_of(request), ImageSize::ZERO);
            }
        }
    }

    /// Extracts and rescales to `preferred_width`, capping the height at
    /// `max_height` (pass `f64::INFINITY` for no cap).
    pub fn extract_scaled<R: RequestSource + ?Sized>(
        &self,
        request: &R,
        preferred_width: f64,
        max_height: f64,
        options: ExtractOptions,
    ) -> ImageSize {
        self.extract(request, options)
            .scaled_to_width(preferred_width, max_height)
    }

    pub fn extract_scaled_async<R, F>(
        &self,
        request: &R,
        preferred_width: f64,
        max_height: f64,
        options: ExtractOptions,
        completion: F,
    ) where
        R: RequestSource + ?Sized,
        F: FnOnce(String, ImageSize) + Send + 'static,
    {
        self.extract_async(request, options, move |url, size| {
            completion(url, size.scaled_to_width(preferred_width, max_height))
        });
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> ExtractConfig {
        self.shared.config.read().clone()
    }

    /// Applies `update` to the configuration. Fetches already started keep
    /// the settings they were created with.
    pub fn update_config(&self, update: impl FnOnce(&mut ExtractConfig)) {
        update(&mut self.shared.config.write());
    }

    pub fn user_agent(&self) -> String {
        self.shared.config.read().user_agent.clone()
    }

    pub fn set_user_agent(&self, user_agent: impl Into<String>) {
        self.shared.config.write().user_agent = user_agent.into();
    }

    pub fn max_connections_per_host(&self) -> usize {
        self.shared.config.read().max_connections_per_host
    }

    pub fn set_max_connections_per_host(&self, max: usize) {
        self.shared.config.write().max_connections_per_host = max;
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.shared.config.write().timeout = timeout;
    }

    pub fn set_chunk_size(&self, chunk_size: ChunkSize) {
        self.shared.config.write().chunk_size = chunk_size;
    }

    /// Whether any asynchronous extraction is still in flight.
    pub fn is_queue_running(&self) -> bool {
        self.shared.registry.is_running()
    }

    /// Number of tracked asynchronous fetches.
    pub fn queue_count(&self) -> usize {
        self.shared.registry.count()
    }

    /// Cancels every asynchronous extraction. Their completions fire with a
    /// zero size. Returns whether anything is still running.
    pub fn cancel_all_queues(&self) -> bool {
        self.shared.registry.cancel_all()
    }

    /// Cancels every asynchronous extraction for the same URL as `request`.
    /// Returns whether anything is still running.
    pub fn cancel_queue<R: RequestSource + ?Sized>(&self, request: &R) -> bool {
        self.shared.registry.cancel_matching(&identity_of(request))
    }
}

impl Drop for Extractor {
    fn drop(&mut self) {
        self.shared.registry.cancel_all();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
