//! World state for scenario execution.
//!
//! The World owns one session, a virtual clock, and a record of everything
//! the session asked its driver to do.

use std::time::{Duration, Instant};

use scribe_core::{
    Endpoint, Response, Session, SessionAction, SessionConfig, SessionError, SessionEvent,
    SessionState,
};
use scribe_proto::OutgoingRequest;

use crate::model::Operation;

/// Session plus everything observable about it.
pub struct World {
    session: Session,
    start: Instant,
    now: Instant,
    events: Vec<SessionEvent>,
    connects: Vec<String>,
    transmitted: Vec<String>,
    disconnects: usize,
}

impl World {
    /// Open a session at a fresh virtual instant.
    pub fn new(endpoint: Endpoint, config: SessionConfig) -> Self {
        let start = Instant::now();
        let (session, actions) = Session::open(endpoint, config, start);
        let mut world = Self {
            session,
            start,
            now: start,
            events: Vec::new(),
            connects: Vec::new(),
            transmitted: Vec::new(),
            disconnects: 0,
        };
        world.record(actions);
        world
    }

    /// The session under test.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Every event the session emitted, in order.
    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    /// URLs of every connect attempt.
    pub fn connects(&self) -> &[String] {
        &self.connects
    }

    /// Frames written to links.
    pub fn transmitted(&self) -> &[String] {
        &self.transmitted
    }

    /// Links or attempts torn down.
    pub fn disconnects(&self) -> usize {
        self.disconnects
    }

    /// Virtual time since the session opened.
    pub fn elapsed(&self) -> Duration {
        self.now - self.start
    }

    /// Number of terminal failure notifications.
    pub fn terminal_failures(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, SessionEvent::TerminalFailure { .. })).count()
    }

    /// Responses that completed.
    pub fn finished_responses(&self) -> Vec<&Response> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::ResponseFinished(response) => Some(response),
                _ => None,
            })
            .collect()
    }

    /// Fragment error messages, in order.
    pub fn fragment_errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::FragmentError { error, .. } => Some(error.message.as_str()),
                _ => None,
            })
            .collect()
    }

    /// States the session passed through, in order.
    pub fn state_history(&self) -> Vec<SessionState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::StateChanged { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Complete the current attempt's handshake.
    pub fn open_link(&mut self) {
        if let Some(connection) = self.session.connection() {
            let actions = self.session.handle_link_opened(connection, self.now);
            self.record(actions);
        }
    }

    /// Fail the current attempt.
    pub fn fail_link(&mut self, reason: &str) {
        if let Some(connection) = self.session.connection() {
            let actions = self.session.handle_link_failed(connection, reason, self.now);
            self.record(actions);
        }
    }

    /// Close the current link from the far side.
    pub fn close_link(&mut self, reason: &str) {
        if let Some(connection) = self.session.connection() {
            let actions = self.session.handle_link_closed(connection, reason, self.now);
            self.record(actions);
        }
    }

    /// Deliver one text frame on the current link.
    pub fn receive(&mut self, text: &str) {
        if let Some(connection) = self.session.connection() {
            let actions = self.session.handle_text(connection, text);
            self.record(actions);
        }
    }

    /// Send a request.
    ///
    /// # Errors
    ///
    /// Whatever the session rejects the request with.
    pub fn send(&mut self, message: &str) -> Result<(), SessionError> {
        let request = OutgoingRequest::new(message)?;
        let actions = self.session.send(&request)?;
        self.record(actions);
        Ok(())
    }

    /// Close the session.
    pub fn close(&mut self) {
        let actions = self.session.close();
        self.record(actions);
    }

    /// Advance the clock by `duration`, firing every deadline on the way.
    pub fn advance(&mut self, duration: Duration) {
        let target = self.now + duration;
        while let Some(deadline) = self.session.poll_timeout() {
            if deadline > target {
                break;
            }
            self.now = self.now.max(deadline);
            let actions = self.session.tick(self.now);
            self.record(actions);
        }
        self.now = target;
    }

    /// Jump to the pending deadline and fire it, if the session is in
    /// `state`.
    pub fn fire_deadline_in(&mut self, state: SessionState) {
        if self.session.state() != state {
            return;
        }
        if let Some(deadline) = self.session.poll_timeout() {
            self.now = self.now.max(deadline);
            let actions = self.session.tick(self.now);
            self.record(actions);
        }
    }

    /// Apply a model operation. For `Send`, returns whether it was accepted.
    pub fn apply(&mut self, op: Operation) -> bool {
        match op {
            Operation::LinkOpens => self.open_link(),
            Operation::LinkFails => self.fail_link("refused"),
            Operation::LinkCloses => self.close_link("reset"),
            Operation::ConnectTimeout => self.fire_deadline_in(SessionState::Connecting),
            Operation::RetryElapsed => self.fire_deadline_in(SessionState::Reconnecting),
            Operation::Send => return self.send("ping").is_ok(),
            Operation::Close => self.close(),
        }
        false
    }

    fn record(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Connect { url, .. } => self.connects.push(url),
                SessionAction::Transmit { text, .. } => self.transmitted.push(text),
                SessionAction::Disconnect { .. } => self.disconnects += 1,
                SessionAction::Notify(event) => self.events.push(event),
            }
        }
    }
}
