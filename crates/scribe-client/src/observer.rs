//! Observer interface for session events.

use std::sync::Arc;

use scribe_core::SessionEvent;
use tokio::sync::mpsc;

/// Receives every event a session produces, in order.
///
/// Called from the session task; implementations must not block.
pub trait SessionObserver: Send + Sync + 'static {
    /// Handle one event.
    fn on_event(&self, event: SessionEvent);
}

impl<O: SessionObserver + ?Sized> SessionObserver for Arc<O> {
    fn on_event(&self, event: SessionEvent) {
        (**self).on_event(event);
    }
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SessionObserver for ChannelObserver {
    fn on_event(&self, event: SessionEvent) {
        // Receiver gone means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpObserver;

impl SessionObserver for NoOpObserver {
    fn on_event(&self, _event: SessionEvent) {}
}
