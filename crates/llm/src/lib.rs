#![deny(unsafe_code)]

use std::sync::Arc;

mod abort;
mod adapter;
mod config;
mod decoder;
mod message;
mod rest_adapter;

pub use abort::{AbortController, AbortSignal};
pub use adapter::{
    AdapterError, AdapterResult, AdapterWorker, ChatModelAdapter, RunHandle, RunRequest,
    SnapshotItem, SnapshotSender, SnapshotStream, snapshot_channel,
};
pub use config::{AdapterConfig, CHAT_PATH, DEFAULT_BASE_URL, normalize_base_url};
pub use decoder::Utf8StreamDecoder;
pub use message::{ChatModelRunResult, ContentPart, Role, ThreadMessage, extract_user_text};
pub use rest_adapter::{REST_ADAPTER_ID, ReadOutcome, RestChatAdapter, accumulate_snapshots};

/// Creates the adapter used for chat runs.
pub fn create_adapter(config: AdapterConfig) -> AdapterResult<Arc<dyn ChatModelAdapter>> {
    Ok(Arc::new(RestChatAdapter::new(config)?))
}
