//! App actions
//!
//! Actions produced by the App state machine for the runtime to execute.

use scribe_proto::OutgoingRequest;

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// State changed; redraw.
    Render,

    /// Print the whole conversation.
    ShowHistory,

    /// Send a request on the session.
    Send {
        /// Message plus prior turns.
        request: OutgoingRequest,
    },

    /// Dispose the session and open a fresh one.
    Restart,

    /// Quit the application.
    Quit,
}
