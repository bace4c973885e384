use resume_llm::{Role, ThreadMessage};

use crate::chat::message::{
    Message, MessageStatus, StreamSessionId, StreamState, StreamTransition, StreamTransitionResult,
    ThreadId,
};

pub const DEFAULT_THREAD_TITLE: &str = "New Chat";
const TITLE_MAX_CHARS: usize = 40;

/// One conversation: ordered messages plus the state of its adapter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: ThreadId,
    pub messages: Vec<Message>,
    pub stream_state: StreamState,
}

impl Thread {
    /// Creates an empty idle thread.
    pub fn new(id: ThreadId) -> Self {
        Self {
            id,
            messages: Vec::new(),
            stream_state: StreamState::Idle,
        }
    }

    /// Title shown in the thread list, taken from the first user message.
    pub fn title(&self) -> String {
        let first_user_text = self
            .messages
            .iter()
            .find(|message| message.role == Role::User)
            .map(Message::text)
            .unwrap_or_default();
        let first_line = first_user_text.lines().next().unwrap_or_default().trim();

        if first_line.is_empty() {
            return DEFAULT_THREAD_TITLE.to_string();
        }

        if first_line.chars().count() > TITLE_MAX_CHARS {
            let truncated = first_line.chars().take(TITLE_MAX_CHARS).collect::<String>();
            format!("{}…", truncated.trim_end())
        } else {
            first_line.to_string()
        }
    }

    /// History in the shape adapters consume.
    pub fn history(&self) -> Vec<ThreadMessage> {
        self.messages.iter().map(Message::to_thread_message).collect()
    }

    /// Returns the newest message.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The assistant message being filled by `session_id`, if still streaming.
    pub fn streaming_message_mut(&mut self, session_id: StreamSessionId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .rev()
            .find(|message| message.status == MessageStatus::Streaming(session_id))
    }

    /// Applies a stream transition to the thread state.
    pub fn apply_stream_transition(
        &mut self,
        transition: StreamTransition,
    ) -> StreamTransitionResult {
        let next_state = self.stream_state.apply(transition)?;
        self.stream_state = next_state.clone();
        Ok(next_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::MessageId;

    #[test]
    fn empty_thread_uses_default_title() {
        assert_eq!(Thread::new(ThreadId::new(1)).title(), DEFAULT_THREAD_TITLE);
    }

    #[test]
    fn title_comes_from_first_user_message() {
        let mut thread = Thread::new(ThreadId::new(1));
        thread
            .messages
            .push(Message::user(MessageId::new(1), "Review my resume\nplease"));
        thread
            .messages
            .push(Message::user(MessageId::new(2), "second question"));

        assert_eq!(thread.title(), "Review my resume");
    }

    #[test]
    fn long_titles_are_truncated_on_char_boundaries() {
        let mut thread = Thread::new(ThreadId::new(1));
        thread.messages.push(Message::user(
            MessageId::new(1),
            "Écris-moi une lettre de motivation pour un poste de développeur Rust",
        ));

        let title = thread.title();
        assert!(title.ends_with('…'));
        assert!(title.chars().count() <= TITLE_MAX_CHARS + 1);
        assert!(title.starts_with("Écris-moi une lettre"));
    }

    #[test]
    fn streaming_message_lookup_matches_session() {
        let mut thread = Thread::new(ThreadId::new(1));
        thread
            .messages
            .push(Message::assistant_streaming(MessageId::new(1), StreamSessionId::new(7)));

        assert!(thread.streaming_message_mut(StreamSessionId::new(8)).is_none());
        assert!(thread.streaming_message_mut(StreamSessionId::new(7)).is_some());
    }
}
