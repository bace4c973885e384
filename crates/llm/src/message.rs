use serde::{Deserialize, Serialize};

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One typed part of a message body.
///
/// Only text parts are forwarded to the backend; other parts are carried so that
/// host threads can hold them without the adapter rejecting the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
    Image { image: String },
}

impl ContentPart {
    /// Creates a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Returns the text of a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// Message handed to an adapter as part of the thread history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl ThreadMessage {
    /// Creates a message from its parts.
    pub fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self { role, content }
    }

    /// Creates a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentPart::text(text)])
    }

    /// Creates an assistant message with a single text part.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentPart::text(text)])
    }
}

/// Snapshot yielded to the host after every body read.
///
/// The text part always holds the full accumulated response, not a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatModelRunResult {
    pub content: Vec<ContentPart>,
}

impl ChatModelRunResult {
    /// Wraps cumulative text as a single text part.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentPart::text(text)],
        }
    }

    /// Returns the first text part, or an empty string for non-text results.
    pub fn text(&self) -> &str {
        self.content
            .iter()
            .find_map(ContentPart::as_text)
            .unwrap_or_default()
    }
}

/// Returns the outgoing user text for a history.
///
/// Only the first content part of the last message is inspected; if it is not a
/// text part (or the history is empty) the backend receives an empty message.
pub fn extract_user_text(messages: &[ThreadMessage]) -> String {
    messages
        .last()
        .and_then(|message| message.content.first())
        .and_then(ContentPart::as_text)
        .map(str::to_string)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_text_part_of_last_message() {
        let messages = vec![
            ThreadMessage::user("first question"),
            ThreadMessage::assistant("first answer"),
            ThreadMessage::new(
                Role::User,
                vec![
                    ContentPart::text("follow up"),
                    ContentPart::text("ignored second part"),
                ],
            ),
        ];

        assert_eq!(extract_user_text(&messages), "follow up");
    }

    #[test]
    fn non_text_leading_part_sends_empty_message() {
        let messages = vec![ThreadMessage::new(
            Role::User,
            vec![
                ContentPart::Image {
                    image: "data:image/png;base64,AAAA".to_string(),
                },
                ContentPart::text("caption after the image"),
            ],
        )];

        assert_eq!(extract_user_text(&messages), "");
    }

    #[test]
    fn empty_history_or_empty_content_sends_empty_message() {
        assert_eq!(extract_user_text(&[]), "");
        assert_eq!(
            extract_user_text(&[ThreadMessage::new(Role::User, Vec::new())]),
            ""
        );
    }

    #[test]
    fn run_result_serializes_as_typed_text_part() {
        let result = ChatModelRunResult::from_text("Hello");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(
            value,
            serde_json::json!({ "content": [{ "type": "text", "text": "Hello" }] })
        );
        assert_eq!(result.text(), "Hello");
    }
}
