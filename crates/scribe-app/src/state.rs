//! Conversation state types.

use scribe_core::ResponseId;
use scribe_proto::Role;

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    /// The local user.
    User,
    /// The backend.
    Assistant,
}

impl Author {
    /// Role used for this author in request history.
    pub fn role(self) -> Role {
        match self {
            Self::User => Role::User,
            Self::Assistant => Role::Model,
        }
    }
}

/// One entry in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Author.
    pub author: Author,
    /// Text so far.
    pub content: String,
    /// Response this message renders, for assistant messages.
    pub response: Option<ResponseId>,
    /// Still receiving chunks.
    pub streaming: bool,
}

impl ChatMessage {
    /// Message typed by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self { author: Author::User, content: content.into(), response: None, streaming: false }
    }

    /// Empty assistant message for a response that just started.
    pub fn assistant(response: ResponseId) -> Self {
        Self {
            author: Author::Assistant,
            content: String::new(),
            response: Some(response),
            streaming: true,
        }
    }
}
