//! A single-use size fetch.
//!
//! `Ready -> Running -> {Completed | Failed | Cancelled} -> Invalidated`.
//! Whichever terminal transition happens first wins and is the only one ever
//! reported; the outcome sink is taken under the lifecycle lock and fired
//! outside it.

use bytes::BytesMut;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{Notify, oneshot};
use tracing::{debug, trace, warn};

use crate::accumulator::ChunkAccumulator;
use crate::config::TransportSettings;
use crate::error::{ExtractError, Result};
use crate::io::{FetchRequest, FullDecoder, Transport};
use crate::request::{ImageRequest, RequestSource, identity_of};
use crate::types::{ChunkSize, ImageSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Ready,
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Torn down after a terminal transition; holds no resources.
    Invalidated,
}

impl TaskState {
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, TaskState::Ready | TaskState::Running)
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Ranged fetch of the leading `chunk + 1` bytes, decoded as they arrive.
    Header(ChunkSize),
    /// Whole resource, handed to the full decoder once complete.
    Full,
}

impl FetchMode {
    fn range_end(self) -> Option<u64> {
        match self {
            FetchMode::Header(chunk) => Some(chunk.bytes()),
            FetchMode::Full => None,
        }
    }
}

/// What a task reports exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub url: String,
    pub size: ImageSize,
    /// `Completed`, `Failed` or `Cancelled`.
    pub state: TaskState,
}

impl Outcome {
    fn rejected(url: String, state: TaskState) -> Self {
        let state = match state {
            TaskState::Cancelled => TaskState::Cancelled,
            _ => TaskState::Failed,
        };
        Self {
            url,
            size: ImageSize::ZERO,
            state,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.state == TaskState::Completed
    }
}

/// Everything a running task needs besides its own request.
#[derive(Clone)]
pub struct TaskContext {
    pub handle: Handle,
    pub transport: Arc<dyn Transport>,
    pub decoder: Arc<dyn FullDecoder>,
}

impl TaskContext {
    pub fn new(handle: Handle, transport: Arc<dyn Transport>, decoder: Arc<dyn FullDecoder>) -> Self {
        Self {
            handle,
            transport,
            decoder,
        }
    }
}

type Callback = Box<dyn FnOnce(Outcome) + Send + 'static>;

enum OutcomeSink {
    Channel(oneshot::Sender<Outcome>),
    Callback(Callback),
}

impl OutcomeSink {
    fn deliver(self, outcome: Outcome) {
        match self {
            OutcomeSink::Channel(tx) => {
                let _ = tx.send(outcome);
            }
            OutcomeSink::Callback(callback) => callback(outcome),
        }
    }
}

struct Lifecycle {
    state: TaskState,
    /// Terminal state this task settled with; survives invalidation.
    settled: Option<TaskState>,
    sink: Option<OutcomeSink>,
    request: Option<FetchRequest>,
    follow_up: Option<Arc<FetchTask>>,
}

pub struct FetchTask {
    identity: String,
    mode: FetchMode,
    lifecycle: Mutex<Lifecycle>,
    cancelled: Notify,
}

impl FetchTask {
    pub fn new(request: ImageRequest, mode: FetchMode, settings: TransportSettings) -> Arc<Self> {
        let identity = request.identity();
        let request = FetchRequest {
            request,
            range_end: mode.range_end(),
            settings,
        };
        Self::build(identity, Some(request), mode)
    }

    /// Builds a task from any request-like value. A value that does not form
    /// a valid request still yields a task; starting it fails immediately.
    pub fn from_source<R: RequestSource + ?Sized>(
        source: &R,
        mode: FetchMode,
        settings: TransportSettings,
    ) -> Arc<Self> {
        match source.to_request() {
            Some(request) => Self::new(request, mode, settings),
            None => Self::build(identity_of(source), None, mode),
        }
    }

    fn build(identity: String, request: Option<FetchRequest>, mode: FetchMode) -> Arc<Self> {
        Arc::new(Self {
            identity,
            mode,
            lifecycle: Mutex::new(Lifecycle {
                state: TaskState::Ready,
                settled: None,
                sink: None,
                request,
                follow_up: None,
            }),
            cancelled: Notify::new(),
        })
    }

    #[inline]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    #[inline]
    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    pub fn state(&self) -> TaskState {
        self.lifecycle.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Links a task that continues this one, such as a full download after
    /// a failed header fetch. Cancelling this task also cancels the linked
    /// one, even after this task has settled.
    pub fn chain(&self, next: Arc<FetchTask>) {
        self.lifecycle.lock().follow_up = Some(next);
    }

    pub fn follow_up(&self) -> Option<Arc<FetchTask>> {
        self.lifecycle.lock().follow_up.clone()
    }

    /// Active itself, or settled with a linked task that has not started.
    pub fn is_pending(&self) -> bool {
        let lifecycle = self.lifecycle.lock();
        lifecycle.state.is_active()
            || lifecycle
                .follow_up
                .as_ref()
                .is_some_and(|next| next.state() == TaskState::Ready)
    }

    /// Starts the fetch on `context.handle`; `completion` runs exactly once,
    /// on a runtime worker or, for requests that fail immediately, on the
    /// calling thread. A task that was already started or cancelled reports
    /// a zero size straight away.
    pub fn start<F>(self: &Arc<Self>, context: &TaskContext, completion: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        if let Err((sink, state)) = self.launch(context, OutcomeSink::Callback(Box::new(completion))) {
            sink.deliver(Outcome::rejected(self.identity.clone(), state));
        }
    }

    /// Starts the fetch and blocks the calling thread until it settles.
    ///
    /// Must not be called from inside a tokio runtime; doing so is refused
    /// with a failed outcome.
    pub fn start_blocking(self: &Arc<Self>, context: &TaskContext) -> Outcome {
        if Handle::try_current().is_ok() {
            warn!(url = %self.identity, "blocking fetch requested from inside a runtime");
            return Outcome::rejected(self.identity.clone(), TaskState::Failed);
        }

        let (tx, rx) = oneshot::channel();
        if let Err((_, state)) = self.launch(context, OutcomeSink::Channel(tx)) {
            return Outcome::rejected(self.identity.clone(), state);
        }
        rx.blocking_recv()
            .unwrap_or_else(|_| Outcome::rejected(self.identity.clone(), TaskState::Failed))
    }

    /// Cancels the fetch and any linked follow-up. Returns `false` when
    /// neither was still active.
    pub fn cancel(&self) -> bool {
        let follow_up = self.follow_up();
        let cancelled = match self.finish(TaskState::Cancelled, ImageSize::ZERO) {
            Some(TaskState::Ready) => {
                self.invalidate();
                true
            }
            Some(_) => {
                self.cancelled.notify_one();
                true
            }
            None => false,
        };
        let continued = follow_up.is_some_and(|next| next.cancel());
        cancelled || continued
    }

    fn launch(
        self: &Arc<Self>,
        context: &TaskContext,
        sink: OutcomeSink,
    ) -> std::result::Result<(), (OutcomeSink, TaskState)> {
        let request = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != TaskState::Ready {
                warn!(url = %self.identity, state = ?lifecycle.state, "fetch task restarted");
                return Err((sink, lifecycle.settled.unwrap_or(lifecycle.state)));
            }
            lifecycle.state = TaskState::Running;
            lifecycle.sink = Some(sink);
            lifecycle.request.take()
        };

        let Some(request) = request else {
            debug!(url = %self.identity, "no valid request to fetch");
            self.finish(TaskState::Failed, ImageSize::ZERO);
            self.invalidate();
            return Ok(());
        };

        debug!(url = %self.identity, mode = ?self.mode, range = ?request.range_end, "fetch started");
        let guard = SettleOnDrop(Arc::clone(self));
        let transport = Arc::clone(&context.transport);
        let decoder = Arc::clone(&context.decoder);
        context.handle.spawn(guard.drive(request, transport, decoder));
        Ok(())
    }

    /// Moves an active task to `state` and fires its sink. Returns the state
    /// it left, or `None` when it had already settled.
    fn finish(&self, state: TaskState, size: ImageSize) -> Option<TaskState> {
        let (previous, sink) = {
            let mut lifecycle = self.lifecycle.lock();
            if !lifecycle.state.is_active() {
                return None;
            }
            let previous = std::mem::replace(&mut lifecycle.state, state);
            lifecycle.settled = Some(state);
            (previous, lifecycle.sink.take())
        };

        debug!(url = %self.identity, ?state, %size, "fetch settled");
        if let Some(sink) = sink {
            sink.deliver(Outcome {
                url: self.identity.clone(),
                size,
                state,
            });
        }
        Some(previous)
    }

    fn invalidate(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state.is_terminal() {
            lifecycle.state = TaskState::Invalidated;
            lifecycle.request = None;
        }
    }
}

/// Owns the task for the lifetime of its fetch future. If the future is
/// dropped before reporting, unpolled or mid-fetch when the runtime shuts
/// down, the task settles as failed.
struct SettleOnDrop(Arc<FetchTask>);

impl SettleOnDrop {
    async fn drive(
        self,
        request: FetchRequest,
        transport: Arc<dyn Transport>,
        decoder: Arc<dyn FullDecoder>,
    ) {
        let task = &self.0;
        let result = tokio::select! {
            biased;
            _ = task.cancelled.notified() => Err(ExtractError::Cancelled),
            result = fetch(request, task.mode, transport.as_ref(), &decoder) => result,
        };

        match result {
            Ok(size) => {
                task.finish(TaskState::Completed, size);
            }
            Err(ExtractError::Cancelled) => {
                trace!(url = %task.identity, "fetch torn down after cancel");
                task.finish(TaskState::Cancelled, ImageSize::ZERO);
            }
            Err(error) => {
                debug!(url = %task.identity, %error, "fetch failed");
                task.finish(TaskState::Failed, ImageSize::ZERO);
            }
        }
    }
}

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        if self.0.finish(TaskState::Failed, ImageSize::ZERO).is_some() {
            debug!(url = %self.0.identity, "fetch dropped before settling");
        }
        self.0.invalidate();
    }
}

impl Drop for FetchTask {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut();
        if let Some(sink) = lifecycle.sink.take() {
            lifecycle.state = TaskState::Failed;
            lifecycle.settled = Some(TaskState::Failed);
            sink.deliver(Outcome::rejected(self.identity.clone(), TaskState::Failed));
        }
    }
}

async fn fetch(
    request: FetchRequest,
    mode: FetchMode,
    transport: &dyn Transport,
    decoder: &Arc<dyn FullDecoder>,
) -> Result<ImageSize> {
    let mut body = transport.open(request).await?;

    match mode {
        FetchMode::Header(chunk) => {
            let limit = chunk.bytes() as usize + 1;
            let mut accumulator = ChunkAccumulator::with_capacity(limit);
            while let Some(slice) = body.next_chunk().await? {
                if let Some(size) = accumulator.push(&slice) {
                    trace!(bytes = accumulator.len(), format = ?accumulator.format(), "header decoded");
                    return Ok(size);
                }
                if accumulator.is_unsupported() {
                    return Err(ExtractError::FormatUnsupported);
                }
                if accumulator.len() >= limit {
                    break;
                }
            }
            Err(ExtractError::MalformedHeader {
                bytes: accumulator.len(),
            })
        }
        FetchMode::Full => {
            let mut buffer = BytesMut::new();
            while let Some(slice) = body.next_chunk().await? {
                buffer.extend_from_slice(&slice);
            }
            let data = buffer.freeze();
            let len = data.len();
            let decoder = Arc::clone(decoder);
            tokio::task::spawn_blocking(move || decoder.decode(&data))
                .await
                .map_err(|e| ExtractError::Decode(e.to_string()))?
                .filter(|size| !size.is_zero())
                .ok_or_else(|| ExtractError::Decode(format!("no image size in {len} bytes")))
        }
    }
}
