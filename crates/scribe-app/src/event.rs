//! App events

use scribe_core::SessionEvent;

/// Inputs to the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A line typed by the user.
    Input(String),

    /// Event from the session observer.
    Session(SessionEvent),

    /// The runtime could not hand a request to the session.
    SendFailed {
        /// Human-readable cause.
        reason: String,
    },
}

impl From<SessionEvent> for AppEvent {
    fn from(event: SessionEvent) -> Self {
        Self::Session(event)
    }
}
