//! Stream kinds and their endpoints.

use std::fmt;

use crate::{Fragment, Result, TranscriptionUpdate};

/// Which backend stream a session talks to.
///
/// The kind fixes both the path suffix appended to the configured base URL
/// and the inbound message shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamKind {
    /// AI assistant chat (`/ws/chat`).
    Chat,
    /// Transcription status for one encounter
    /// (`/ws/transcription/{encounter_id}`).
    Transcription {
        /// Encounter whose transcription is being watched.
        encounter_id: u64,
    },
}

impl StreamKind {
    /// Path suffix for this stream.
    pub fn path(&self) -> String {
        match self {
            Self::Chat => "/ws/chat".to_string(),
            Self::Transcription { encounter_id } => format!("/ws/transcription/{encounter_id}"),
        }
    }

    /// Decode one inbound text frame into a fragment.
    pub fn decode(&self, text: &str) -> Result<Fragment> {
        match self {
            Self::Chat => Fragment::decode(text),
            Self::Transcription { .. } => TranscriptionUpdate::decode(text).map(Fragment::from),
        }
    }

    /// Whether the stream accepts outgoing requests.
    ///
    /// The transcription feed is push-only.
    pub fn accepts_requests(&self) -> bool {
        matches!(self, Self::Chat)
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Transcription { encounter_id } => write!(f, "transcription:{encounter_id}"),
        }
    }
}
