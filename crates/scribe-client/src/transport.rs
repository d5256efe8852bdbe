//! Transport abstraction for the session runtime.
//!
//! A link is a duplex stream of text frames. Production uses WebSockets,
//! tests use an in-memory script or a turmoil-simulated TCP socket.
//!
//! The two halves are separate objects so the runtime can keep a reader
//! task blocked in [`TransportReceiver::recv`] while it writes through the
//! [`TransportSender`].

use async_trait::async_trait;

use crate::TransportError;

/// Opens links to a session endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Write half of an established link.
    type Sender: TransportSender;

    /// Read half of an established link.
    type Receiver: TransportReceiver;

    /// Connect to `url` and complete the handshake.
    ///
    /// The runtime bounds this with the session's connect timeout; an
    /// implementation does not need its own.
    async fn connect(&self, url: &str) -> Result<(Self::Sender, Self::Receiver), TransportError>;
}

/// Write half of a link.
#[async_trait]
pub trait TransportSender: Send + 'static {
    /// Write one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the link. Errors are swallowed; the link is gone either way.
    async fn close(&mut self);
}

/// Read half of a link.
#[async_trait]
pub trait TransportReceiver: Send + 'static {
    /// Next text frame.
    ///
    /// Returns `Ok(None)` when the peer closed the link.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;
}
