use resume_llm::{ContentPart, Role, ThreadMessage};

/// Stable identifier for one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl ThreadId {
    /// Creates a typed thread identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Stable identifier for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identifier for one adapter run.
///
/// A new one is issued on every submit so late snapshots of an older run can be
/// told apart from the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamSessionId(pub u64);

impl StreamSessionId {
    /// Creates a typed stream session identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Routing key for stream events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub thread_id: ThreadId,
    pub session_id: StreamSessionId,
}

impl StreamTarget {
    /// Creates a routing key for stream events.
    pub const fn new(thread_id: ThreadId, session_id: StreamSessionId) -> Self {
        Self {
            thread_id,
            session_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    Streaming(StreamSessionId),
    Done,
    Error(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: Vec<ContentPart>,
    pub status: MessageStatus,
}

impl Message {
    /// Creates a message.
    pub fn new(
        id: MessageId,
        role: Role,
        content: Vec<ContentPart>,
        status: MessageStatus,
    ) -> Self {
        Self {
            id,
            role,
            content,
            status,
        }
    }

    /// Creates a finished user message with a single text part.
    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self::new(
            id,
            Role::User,
            vec![ContentPart::text(text)],
            MessageStatus::Done,
        )
    }

    /// Empty assistant message that snapshots of `session_id` will fill in.
    pub fn assistant_streaming(id: MessageId, session_id: StreamSessionId) -> Self {
        Self::new(
            id,
            Role::Assistant,
            Vec::new(),
            MessageStatus::Streaming(session_id),
        )
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    /// Converts the message into adapter history.
    pub fn to_thread_message(&self) -> ThreadMessage {
        ThreadMessage::new(self.role, self.content.clone())
    }
}

/// Stream lifecycle of one thread.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming(StreamTarget),
    Done(StreamTarget),
    Error {
        target: StreamTarget,
        message: String,
    },
    Cancelled(StreamTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransition {
    Start(StreamTarget),
    Complete(StreamTarget),
    Fail {
        target: StreamTarget,
        message: String,
    },
    Cancel(StreamTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransitionRejection {
    AlreadyStreaming {
        active: StreamTarget,
        attempted: StreamTarget,
    },
    NoActiveStream,
    SessionMismatch {
        active: StreamTarget,
        attempted: StreamTarget,
    },
}

pub type StreamTransitionResult = Result<StreamState, StreamTransitionRejection>;

impl StreamState {
    /// Returns the running session, if any.
    pub fn active_target(&self) -> Option<StreamTarget> {
        match self {
            Self::Streaming(target) => Some(*target),
            Self::Idle | Self::Done(_) | Self::Error { .. } | Self::Cancelled(_) => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.active_target().is_some()
    }

    /// Returns true when an event for `target` belongs to the running session.
    pub fn accepts_stream_event(&self, target: StreamTarget) -> bool {
        self.active_target() == Some(target)
    }

    /// Applies one transition.
    ///
    /// Any state may start a session unless a different one is running. Terminal
    /// transitions must name the running session exactly.
    pub fn apply(&self, transition: StreamTransition) -> StreamTransitionResult {
        match transition {
            StreamTransition::Start(target) => match self.active_target() {
                Some(active) if active != target => {
                    Err(StreamTransitionRejection::AlreadyStreaming {
                        active,
                        attempted: target,
                    })
                }
                _ => Ok(Self::Streaming(target)),
            },
            StreamTransition::Complete(target) => self.finish(target, Self::Done(target)),
            StreamTransition::Fail { target, message } => {
                self.finish(target, Self::Error { target, message })
            }
            StreamTransition::Cancel(target) => self.finish(target, Self::Cancelled(target)),
        }
    }

    fn finish(&self, target: StreamTarget, next: StreamState) -> StreamTransitionResult {
        match self.active_target() {
            Some(active) if active == target => Ok(next),
            Some(active) => Err(StreamTransitionRejection::SessionMismatch {
                active,
                attempted: target,
            }),
            None => Err(StreamTransitionRejection::NoActiveStream),
        }
    }
}
