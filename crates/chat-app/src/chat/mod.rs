/// Event contracts between adapter runs and threads.
pub mod events;
/// Identifiers, messages and the stream state machine.
pub mod message;
pub mod thread;
pub mod thread_list;

pub use events::{StreamEventMapped, StreamEventPayload};
pub use message::{
    Message, MessageId, MessageStatus, StreamSessionId, StreamState, StreamTarget,
    StreamTransition, StreamTransitionRejection, StreamTransitionResult, ThreadId,
};
pub use thread::{DEFAULT_THREAD_TITLE, Thread};
pub use thread_list::{ThreadList, ThreadSummary};
