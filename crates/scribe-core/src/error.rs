//! Session error types.

use scribe_proto::{ProtocolError, StreamKind};
use thiserror::Error;

use crate::session::SessionState;

/// Errors returned synchronously by session operations.
///
/// Transport failures are never reported here; they surface as
/// [`crate::SessionEvent`]s.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session is not open, so nothing was sent.
    #[error("connection unavailable (session is {state})")]
    ConnectionUnavailable {
        /// State at the time of the call.
        state: SessionState,
    },

    /// The stream is push-only and does not take requests.
    #[error("{kind} stream does not accept requests")]
    ReadOnlyStream {
        /// Stream the session is attached to.
        kind: StreamKind,
    },

    /// Request could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
