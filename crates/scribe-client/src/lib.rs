//! Async client for Scribe streaming sessions
//!
//! Drives a [`scribe_core::Session`] over a real (or simulated) transport.
//! Each session runs on its own tokio task; the [`SessionHandle`] talks to it
//! through a command channel and a state watch, and events reach the caller
//! through a [`SessionObserver`].
//!
//! # Components
//!
//! - [`SessionHandle`]: Open, send, close
//! - [`Transport`]: Link abstraction (WebSocket in production, in-memory or
//!   turmoil in tests)
//! - [`SessionObserver`]: Event sink ([`ChannelObserver`], [`NoOpObserver`])
//! - `WebSocketTransport`: tokio-tungstenite transport, behind the
//!   `transport` feature

mod error;
mod handle;
mod observer;
mod transport;
#[cfg(feature = "transport")]
mod websocket;

pub use error::{ClientError, TransportError};
pub use handle::SessionHandle;
pub use observer::{ChannelObserver, NoOpObserver, SessionObserver};
pub use scribe_core::{SessionConfig, SessionEvent, SessionState};
pub use transport::{Transport, TransportReceiver, TransportSender};
#[cfg(feature = "transport")]
pub use websocket::{WebSocketReceiver, WebSocketSender, WebSocketTransport, client_request, split_socket};
