use crate::chat::message::{StreamTarget, StreamTransition};

/// Adapter output mapped into thread language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventPayload {
    /// Full response text received so far.
    Snapshot(String),
    Done,
    Error(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEventMapped {
    pub target: StreamTarget,
    pub payload: StreamEventPayload,
}

impl StreamEventMapped {
    /// Creates a routed stream event.
    pub fn new(target: StreamTarget, payload: StreamEventPayload) -> Self {
        Self { target, payload }
    }

    /// Returns true when the event ends the run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.payload, StreamEventPayload::Snapshot(_))
    }

    /// Maps terminal payloads to stream state transitions.
    ///
    /// Snapshots return `None`: they rewrite message content, not the lifecycle.
    pub fn into_transition(self) -> Option<StreamTransition> {
        match self.payload {
            StreamEventPayload::Snapshot(_) => None,
            StreamEventPayload::Done => Some(StreamTransition::Complete(self.target)),
            StreamEventPayload::Error(message) => Some(StreamTransition::Fail {
                target: self.target,
                message,
            }),
            StreamEventPayload::Cancelled => Some(StreamTransition::Cancel(self.target)),
        }
    }
}
