use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use snafu::ResultExt;

use crate::abort::AbortSignal;
use crate::adapter::{
    AdapterResult, AdapterWorker, BuildHttpClientSnafu, BuildRequestSnafu, ChatModelAdapter,
    ReadBodySnafu, RequestSnafu, RunHandle, RunRequest, ServerStatusSnafu, SnapshotSender,
    snapshot_channel,
};
use crate::config::AdapterConfig;
use crate::decoder::Utf8StreamDecoder;
use crate::message::{ChatModelRunResult, extract_user_text};

pub const REST_ADAPTER_ID: &str = "rest";

#[derive(Debug, Serialize)]
struct ChatRequestBody {
    message: String,
}

/// How a body read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Completed,
    Aborted,
    ReceiverDropped,
    Failed,
}

/// Adapter for a backend that answers `POST /api/chat` with a plain-text stream.
pub struct RestChatAdapter {
    config: AdapterConfig,
    client: reqwest::Client,
}

impl RestChatAdapter {
    /// Creates an adapter with its own HTTP client.
    pub fn new(config: AdapterConfig) -> AdapterResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("resume-assistant/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(BuildHttpClientSnafu {
                stage: "rest-adapter-new",
            })?;

        Ok(Self::with_client(config, client))
    }

    /// Creates an adapter over an existing HTTP client.
    pub fn with_client(config: AdapterConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Returns the adapter configuration.
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    async fn run_stream_worker(
        client: reqwest::Client,
        request: reqwest::Request,
        event_tx: SnapshotSender,
        abort: AbortSignal,
    ) {
        let url = request.url().to_string();

        let response = tokio::select! {
            biased;
            _ = abort.aborted() => {
                tracing::debug!(url = %url, "chat request aborted before response");
                return;
            }
            response = client.execute(request) => response,
        };

        let response = match response.context(RequestSnafu {
            stage: "send-chat-request",
        }) {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(url = %url, error = %error, "failed to send chat request");
                let _ = event_tx.send(Err(error));
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                url = %url,
                status = status.as_u16(),
                "chat endpoint returned error status"
            );
            let _ = event_tx.send(
                ServerStatusSnafu {
                    stage: "chat-http-status",
                    status: status.as_u16(),
                }
                .fail(),
            );
            return;
        }

        let body = std::pin::pin!(response.bytes_stream());
        let outcome = accumulate_snapshots(body, abort, event_tx).await;
        tracing::debug!(url = %url, outcome = ?outcome, "chat stream finished");
    }
}

impl ChatModelAdapter for RestChatAdapter {
    fn id(&self) -> &str {
        REST_ADAPTER_ID
    }

    fn run(&self, request: RunRequest) -> AdapterResult<RunHandle> {
        let url = self.config.chat_url();
        let body = ChatRequestBody {
            message: extract_user_text(&request.messages),
        };

        // `json` also sets `Content-Type: application/json`.
        let http_request = self
            .client
            .post(url.as_str())
            .json(&body)
            .build()
            .context(BuildRequestSnafu {
                stage: "build-chat-request",
                url: url.clone(),
            })?;

        tracing::debug!(
            url = %url,
            history_len = request.messages.len(),
            message_len = body.message.len(),
            "opening chat stream"
        );

        let (event_tx, stream, worker_signal) = snapshot_channel(&request.abort_signal);
        let worker: AdapterWorker = Box::pin(Self::run_stream_worker(
            self.client.clone(),
            http_request,
            event_tx,
            worker_signal,
        ));

        Ok(RunHandle { stream, worker })
    }
}

/// Decodes a byte stream and sends the accumulated text after every read.
///
/// Stops without emitting anything further once `abort` fires. A read error is
/// forwarded as the final item.
pub async fn accumulate_snapshots<S>(
    mut body: S,
    abort: AbortSignal,
    event_tx: SnapshotSender,
) -> ReadOutcome
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    let mut decoder = Utf8StreamDecoder::new();
    let mut accumulated = String::new();

    loop {
        let next_chunk = tokio::select! {
            biased;
            _ = abort.aborted() => return ReadOutcome::Aborted,
            next_chunk = body.next() => next_chunk,
        };

        let chunk = match next_chunk {
            Some(Ok(chunk)) => chunk,
            Some(Err(source)) => {
                tracing::warn!(error = %source, "chat stream read failed");
                let error = Err(source).context(ReadBodySnafu {
                    stage: "read-chat-body",
                });
                let _ = event_tx.send(error);
                return ReadOutcome::Failed;
            }
            None => {
                // A dangling partial sequence is dropped, not sent as a last snapshot.
                if !decoder.finish().is_empty() {
                    tracing::debug!("chat stream ended inside a multi-byte sequence");
                }
                return ReadOutcome::Completed;
            }
        };

        accumulated.push_str(&decoder.decode(&chunk));

        if abort.is_aborted() {
            return ReadOutcome::Aborted;
        }

        if event_tx
            .send(Ok(ChatModelRunResult::from_text(accumulated.clone())))
            .is_err()
        {
            return ReadOutcome::ReceiverDropped;
        }
    }
}
