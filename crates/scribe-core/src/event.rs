//! Events surfaced to the session observer.

use crate::{
    assembler::{FragmentError, Response, ResponseId},
    session::SessionState,
};

/// Something the hosting application should know about.
///
/// Transport-level failures are reported only through these events, never
/// as errors returned to the caller, so a UI can render status without
/// wrapping every call in error handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session moved to a new state.
    StateChanged {
        /// New state.
        state: SessionState,
        /// Reconnect attempts made since the last successful open.
        attempt: u32,
    },

    /// A connect attempt failed, timed out, or an open link closed
    /// unexpectedly. Recovery is automatic while budget remains.
    LinkError {
        /// Human-readable cause.
        reason: String,
    },

    /// First fragment of a new response arrived.
    ResponseStarted {
        /// Response being assembled.
        response: ResponseId,
    },

    /// Text appended to the in-progress response.
    Chunk {
        /// Response being assembled.
        response: ResponseId,
        /// Appended text.
        text: String,
    },

    /// A completion fragment closed the response.
    ResponseFinished(Response),

    /// The link dropped while a response was still streaming; the partial
    /// text will not be continued.
    ResponseAbandoned(Response),

    /// The backend reported an error for the current exchange. The
    /// connection stays open.
    FragmentError {
        /// Reported error.
        error: FragmentError,
        /// Response that was in progress when the error arrived, if any.
        partial: Option<Response>,
    },

    /// A queued request was dropped because the session left `Open` before
    /// it could be written.
    SendRejected {
        /// State the session was in.
        state: SessionState,
    },

    /// Retry budget exhausted. Emitted exactly once; the session needs to be
    /// closed and reopened by the user.
    TerminalFailure {
        /// Reconnect attempts made.
        attempts: u32,
    },
}
