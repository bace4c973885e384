use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use snafu::Snafu;
use tokio::sync::mpsc;

use crate::abort::AbortSignal;
use crate::message::{ChatModelRunResult, ThreadMessage};

/// Input of one adapter run: the thread history and the caller's abort signal.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub messages: Vec<ThreadMessage>,
    pub abort_signal: AbortSignal,
}

impl RunRequest {
    /// Creates a run request.
    pub fn new(messages: Vec<ThreadMessage>, abort_signal: AbortSignal) -> Self {
        Self {
            messages,
            abort_signal,
        }
    }
}

pub type AdapterWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type AdapterResult<T> = Result<T, AdapterError>;
pub type SnapshotItem = AdapterResult<ChatModelRunResult>;
pub type SnapshotSender = mpsc::UnboundedSender<SnapshotItem>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AdapterError {
    #[snafu(display("failed to build http client on `{stage}`, {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("failed to build chat request for '{url}' on `{stage}`, {source}"))]
    BuildRequest {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
    #[snafu(display("chat request failed on `{stage}`, {source}"))]
    Request {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("server error: {status}"))]
    ServerStatus { stage: &'static str, status: u16 },
    #[snafu(display("failed to read response body on `{stage}`, {source}"))]
    ReadBody {
        stage: &'static str,
        source: reqwest::Error,
    },
}

impl AdapterError {
    /// HTTP status carried by a non-success response, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerStatus { status, .. } => Some(*status),
            Self::BuildHttpClient { .. }
            | Self::BuildRequest { .. }
            | Self::Request { .. }
            | Self::ReadBody { .. } => None,
        }
    }
}

/// Receiving side of one run.
///
/// Yields cumulative snapshots until the worker finishes. An error item is always
/// the last item. Dropping the stream cancels the worker.
pub struct SnapshotStream {
    events: mpsc::UnboundedReceiver<SnapshotItem>,
    cancel: AbortSignal,
}

pub struct RunHandle {
    pub stream: SnapshotStream,
    pub worker: AdapterWorker,
}

impl SnapshotStream {
    /// Receives the next snapshot, or `None` once the run has ended.
    pub async fn recv(&mut self) -> Option<SnapshotItem> {
        self.events.recv().await
    }

    /// Stops this run without firing the caller's abort signal.
    pub fn cancel(&mut self) -> bool {
        let already_cancelled = self.cancel.is_aborted();
        self.cancel.fire();
        !already_cancelled
    }
}

impl Stream for SnapshotStream {
    type Item = SnapshotItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.cancel.fire();
    }
}

/// Streaming interface the chat runtime drives.
pub trait ChatModelAdapter: Send + Sync {
    fn id(&self) -> &str;
    fn run(&self, request: RunRequest) -> AdapterResult<RunHandle>;
}

/// Creates the channel pair for one run.
///
/// The returned signal fires when either `abort_signal` fires or the stream is
/// cancelled or dropped; workers should watch it instead of the caller's signal.
pub fn snapshot_channel(
    abort_signal: &AbortSignal,
) -> (SnapshotSender, SnapshotStream, AbortSignal) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let cancel = abort_signal.child();
    (
        event_tx,
        SnapshotStream {
            events: event_rx,
            cancel: cancel.clone(),
        },
        cancel,
    )
}
