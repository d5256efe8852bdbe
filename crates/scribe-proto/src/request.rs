//! Outgoing chat requests.
//!
//! A request is the user's message plus the conversation so far. History is
//! sent in the `parts` layout the generation backend consumes, with the
//! assistant side tagged as `model`.

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, Result};

/// Originator of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Turn written by the clinician.
    User,
    /// Turn produced by the assistant.
    Model,
}

/// One text part of a history turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Turn text.
    pub text: String,
}

/// A prior conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    /// Who wrote the turn.
    pub role: Role,
    /// Turn content. The client always sends exactly one part.
    pub parts: Vec<Part>,
}

impl HistoryTurn {
    /// Single-part turn.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self { role, parts: vec![Part { text: text.into() }] }
    }

    /// Concatenated text of all parts.
    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

/// Application message sent by the caller.
///
/// Serialized to a single text frame and transmitted atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingRequest {
    /// User-authored text.
    pub message: String,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

impl OutgoingRequest {
    /// Request without history.
    ///
    /// The message is trimmed; blank messages are rejected since the backend
    /// has nothing to answer.
    pub fn new(message: impl AsRef<str>) -> Result<Self> {
        let message = message.as_ref().trim();
        if message.is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }
        Ok(Self { message: message.to_string(), history: Vec::new() })
    }

    /// Attach prior turns.
    #[must_use]
    pub fn with_history(mut self, history: Vec<HistoryTurn>) -> Self {
        self.history = history;
        self
    }

    /// Encode as one text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| ProtocolError::Encode { source })
    }

    /// Decode a request frame. Used by simulated backends.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| ProtocolError::Malformed { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_message() {
        let request = OutgoingRequest::new("  dolor torácico  ").unwrap();
        assert_eq!(request.message, "dolor torácico");
        assert!(request.history.is_empty());
    }

    #[test]
    fn new_rejects_blank_message() {
        assert!(matches!(OutgoingRequest::new("   \n"), Err(ProtocolError::EmptyMessage)));
        assert!(matches!(OutgoingRequest::new(""), Err(ProtocolError::EmptyMessage)));
    }

    #[test]
    fn encode_with_history() {
        let request = OutgoingRequest::new("and the dose?").unwrap().with_history(vec![
            HistoryTurn::new(Role::User, "what is amoxicillin?"),
            HistoryTurn::new(Role::Model, "an antibiotic"),
        ]);

        insta::assert_snapshot!(
            request.encode().unwrap(),
            @r#"{"message":"and the dose?","history":[{"role":"user","parts":[{"text":"what is amoxicillin?"}]},{"role":"model","parts":[{"text":"an antibiotic"}]}]}"#
        );
    }

    #[test]
    fn decode_without_history_field() {
        let request = OutgoingRequest::decode(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(request.message, "hi");
        assert!(request.history.is_empty());
    }

    #[test]
    fn turn_text_joins_parts() {
        let turn = HistoryTurn {
            role: Role::Model,
            parts: vec![Part { text: "ab".into() }, Part { text: "c".into() }],
        };
        assert_eq!(turn.text(), "abc");
    }
}
