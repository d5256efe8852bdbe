//! Reference model of the session lifecycle.
//!
//! Deliberately naive: a handful of fields and one match per operation. The
//! model-based tests drive [`scribe_core::Session`] and this model with the
//! same operation sequences and require identical observable behaviour.

use scribe_core::SessionState;

/// Inputs shared by the model and the real session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// The current attempt completes its handshake.
    LinkOpens,
    /// The current attempt fails before the handshake.
    LinkFails,
    /// The current link closes without the owner asking.
    LinkCloses,
    /// The handshake deadline passes.
    ConnectTimeout,
    /// The reconnect delay passes.
    RetryElapsed,
    /// The owner sends a request.
    Send,
    /// The owner closes the session.
    Close,
}

/// Reference session.
#[derive(Debug, Clone)]
pub struct ModelSession {
    state: SessionState,
    attempts: u32,
    max_attempts: u32,
    terminal_notifications: usize,
}

impl ModelSession {
    /// Session that has just started its first attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: SessionState::Connecting,
            attempts: 0,
            max_attempts,
            terminal_notifications: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Terminal failure notifications emitted so far.
    pub fn terminal_notifications(&self) -> usize {
        self.terminal_notifications
    }

    /// Apply `op`. For `Send`, returns whether the request is accepted.
    pub fn apply(&mut self, op: Operation) -> bool {
        match (op, self.state) {
            (Operation::LinkOpens, SessionState::Connecting) => {
                self.state = SessionState::Open;
                self.attempts = 0;
            },
            (Operation::LinkFails | Operation::ConnectTimeout, SessionState::Connecting)
            | (Operation::LinkCloses, SessionState::Connecting | SessionState::Open) => {
                self.state = SessionState::Reconnecting;
            },
            (Operation::RetryElapsed, SessionState::Reconnecting) => {
                if self.attempts < self.max_attempts {
                    self.attempts += 1;
                }
                if self.attempts >= self.max_attempts {
                    self.state = SessionState::Failed;
                    self.terminal_notifications += 1;
                } else {
                    self.state = SessionState::Connecting;
                }
            },
            (Operation::Send, state) => return state == SessionState::Open,
            (Operation::Close, _) => self.state = SessionState::Closed,
            _ => {},
        }
        false
    }
}
