//! Scribe streaming session core
//!
//! Pure state machine logic for the streaming session client, completely
//! decoupled from I/O so reconnect and assembly behaviour can be tested
//! deterministically.
//!
//! # Architecture
//!
//! The [`Session`] never touches a socket or a timer. Every input (link
//! opened, text received, deadline reached, user request) is a method call
//! that takes the current time and returns declarative [`SessionAction`]s.
//! A runtime or test harness interprets those actions: it opens and drops
//! links, writes frames, arms a single timer at [`Session::poll_timeout`],
//! and forwards [`SessionEvent`]s to whoever observes the session.
//!
//! # Components
//!
//! - [`session`]: Session state machine (connect, retry, send, close)
//! - [`assembler`]: Folds fragments into responses
//! - [`config`]: Timeouts and retry budget
//! - [`endpoint`]: Validated socket URL
//! - [`event`]: Events surfaced to the observer
//! - [`mod@env`]: Clock abstraction
//! - [`error`]: Session error types

pub mod assembler;
pub mod config;
pub mod endpoint;
pub mod env;
pub mod error;
pub mod event;
pub mod session;

pub use assembler::{FragmentError, Response, ResponseAssembler, ResponseId};
pub use config::SessionConfig;
pub use endpoint::{Endpoint, EndpointError};
pub use env::{Environment, SystemEnv};
pub use error::SessionError;
pub use event::SessionEvent;
pub use session::{ConnectionId, Session, SessionAction, SessionState};
