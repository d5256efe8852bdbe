//! Transcription status feed.
//!
//! The transcription socket is push-only: after audio is uploaded over HTTP,
//! the backend announces progress and finally the transcript:
//!
//! ```text
//! {"status": "processing"}
//! {"status": "completed", "content": "Paciente refiere..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::{Fragment, ProtocolError, Result};

/// Progress of a transcription job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionStatus {
    /// Audio received, transcription running.
    Processing,
    /// Transcript available in `content`.
    Completed,
}

/// One message on the transcription feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionUpdate {
    /// Job status.
    pub status: TranscriptionStatus,
    /// Transcript text, present once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl TranscriptionUpdate {
    /// Decode an update from one text frame.
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| ProtocolError::Malformed { source })
    }

    /// Encode as one text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|source| ProtocolError::Encode { source })
    }
}

/// `processing` opens a response with no text yet; `completed` delivers the
/// whole transcript as the final chunk.
impl From<TranscriptionUpdate> for Fragment {
    fn from(update: TranscriptionUpdate) -> Self {
        match update.status {
            TranscriptionStatus::Processing => Self::default(),
            TranscriptionStatus::Completed => Self {
                chunk: Some(update.content.unwrap_or_default()),
                done: true,
                ..Self::default()
            },
        }
    }
}
