//! Inbound streaming fragments.
//!
//! The chat backend streams a response as a run of fragments:
//!
//! ```text
//! {"chunk": "The ", "done": false}
//! {"chunk": "answer", "done": false}
//! {"chunk": "", "done": true}
//! ```
//!
//! A failed generation is reported as `{"error": "...", "code": "..."}`.

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, Result};

/// One inbound unit of a streamed response.
///
/// Fragments have no identity; they are consumed in arrival order by the
/// session's response assembler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Text to append to the in-progress response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,

    /// Set on the last fragment of a response.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,

    /// Application-level failure reported by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Machine-readable error code accompanying `error`
    /// (`invalid_format`, `stream_error`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Fragment {
    /// Fragment carrying a text chunk.
    pub fn chunk(text: impl Into<String>) -> Self {
        Self { chunk: Some(text.into()), ..Self::default() }
    }

    /// Completion marker with an empty chunk, as the backend sends it.
    pub fn done() -> Self {
        Self { chunk: Some(String::new()), done: true, ..Self::default() }
    }

    /// Error fragment.
    pub fn error(message: impl Into<String>, code: Option<String>) -> Self {
        Self { error: Some(message.into()), code, ..Self::default() }
    }

    /// Decode a fragment from one text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| ProtocolError::Malformed { source })
    }

    /// Encode this fragment as one text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| ProtocolError::Encode { source })
    }

    /// Whether this fragment reports an error.
    ///
    /// An error fragment takes precedence over any chunk or completion flag it
    /// also carries.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Chunk text, treating a missing chunk as empty.
    pub fn text(&self) -> &str {
        self.chunk.as_deref().unwrap_or_default()
    }
}
