//! Application layer for Scribe
//!
//! Pure chat state machine driven by session events and user input, so the
//! same logic runs in the terminal client and in tests.
//!
//! # Components
//!
//! - [`App`]: Conversation, loading flag, inline error, connection status
//! - [`AppEvent`]: Inputs (user lines, session events, send failures)
//! - [`AppAction`]: Effects for the runtime (send, restart, render, quit)
//! - [`commands`]: Line parsing

mod action;
mod app;
pub mod commands;
mod event;
mod state;

pub use action::AppAction;
pub use app::{App, CONNECTION_ERROR, CONNECTION_LOST, RETRIES_EXHAUSTED};
pub use commands::Command;
pub use event::AppEvent;
pub use state::{Author, ChatMessage};
