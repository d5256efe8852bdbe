//! Client and transport errors.

use scribe_core::{SessionError, SessionState};
use scribe_proto::{ProtocolError, StreamKind};
use thiserror::Error;

/// Errors returned synchronously by [`crate::SessionHandle`].
///
/// Link failures never surface here; they reach the observer as
/// `LinkError` and `TerminalFailure` events.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session is not `Open`. Nothing was written.
    #[error("connection unavailable ({state})")]
    ConnectionUnavailable {
        /// State at the time of the call.
        state: SessionState,
    },

    /// The stream is push-only.
    #[error("stream {kind} does not accept requests")]
    ReadOnlyStream {
        /// Stream that rejected the request.
        kind: StreamKind,
    },

    /// Request could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<SessionError> for ClientError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::ConnectionUnavailable { state } => Self::ConnectionUnavailable { state },
            SessionError::ReadOnlyStream { kind } => Self::ReadOnlyStream { kind },
            SessionError::Protocol(err) => Self::Protocol(err),
        }
    }
}

/// Errors produced by a [`crate::Transport`] link.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Handshake did not complete.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Link refused a frame.
    #[error("send failed: {0}")]
    Send(String),

    /// Link broke while reading.
    #[error("receive failed: {0}")]
    Receive(String),

    /// WebSocket protocol or I/O error.
    #[cfg(feature = "transport")]
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
