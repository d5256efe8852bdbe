//! Session state machine.
//!
//! A session owns at most one link to its endpoint and keeps it alive with a
//! bounded, constant-delay retry loop.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Methods accept time as parameter (no stored clock)
//! - Methods return `Vec<SessionAction>` for the driver to execute
//! - The driver arms one timer at [`Session::poll_timeout`] and calls
//!   [`Session::tick`] when it fires
//!
//! # State Machine
//!
//! ```text
//!                 handshake ok
//!  ┌────────────┐ ───────────> ┌──────┐
//!  │ Connecting │              │ Open │
//!  └────────────┘ <─┐          └──────┘
//!        │          │ delay        │
//!        │ fail /   │              │ link closed
//!        │ timeout  │              │
//!        ↓          │              ↓
//!  ┌──────────────┐ │    ┌──────────────┐
//!  │ Reconnecting │─┘    │ Reconnecting │ ...
//!  └──────────────┘      └──────────────┘
//!        │ budget exhausted
//!        ↓
//!   ┌────────┐          close() from any state
//!   │ Failed │          ─────────────────────> Closed
//!   └────────┘
//! ```
//!
//! # Retry budget
//!
//! Every loss (failed handshake, handshake timeout, abnormal closure) waits
//! out the reconnect delay. When the delay elapses the attempt counter is
//! incremented; once it reaches `max_reconnect_attempts` the session fails
//! instead of connecting again. With the default budget of 3 a dead backend
//! sees three connect attempts in total.
//!
//! # Links
//!
//! Every connect attempt gets a fresh [`ConnectionId`]. Inputs tagged with
//! any other id are stale (a superseded attempt, or a link already torn
//! down) and are ignored, so at most one link is ever live.

use std::{fmt, time::Instant};

use scribe_proto::OutgoingRequest;
use tracing::{debug, info, warn};

use crate::{
    assembler::{Response, ResponseAssembler},
    config::SessionConfig,
    endpoint::Endpoint,
    error::SessionError,
    event::SessionEvent,
};

/// Identifies one connect attempt and the link it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Connect attempt in flight.
    Connecting,
    /// Link established; requests may be sent.
    Open,
    /// Waiting out the reconnect delay.
    Reconnecting,
    /// Retry budget exhausted. Terminal.
    Failed,
    /// Closed by the owner. Terminal.
    Closed,
}

impl SessionState {
    /// Whether no further transitions (other than `close`) can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Actions returned by the session state machine.
///
/// The driver (runtime or test harness) executes these in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a link to `url`, reporting the outcome tagged with `connection`.
    Connect {
        /// Attempt identity.
        connection: ConnectionId,
        /// Full socket URL.
        url: String,
    },

    /// Write one text frame on the link.
    Transmit {
        /// Link to write on.
        connection: ConnectionId,
        /// Serialized request.
        text: String,
    },

    /// Abort the attempt or close the link.
    Disconnect {
        /// Attempt or link to drop.
        connection: ConnectionId,
    },

    /// Forward an event to the observer.
    Notify(SessionEvent),
}

/// Streaming session state machine.
///
/// Pure: no I/O and no stored clock. See the module docs for the contract.
#[derive(Debug)]
pub struct Session {
    endpoint: Endpoint,
    config: SessionConfig,
    state: SessionState,
    /// Reconnect attempts since the last successful open.
    attempts: u32,
    /// Current attempt or link.
    connection: Option<ConnectionId>,
    next_connection: u64,
    /// Handshake deadline while connecting, retry time while reconnecting.
    /// `None` when the configured duration runs past the clock's range.
    deadline: Option<Instant>,
    assembler: ResponseAssembler,
}

impl Session {
    /// Create a session and start its first connect attempt.
    pub fn open(
        endpoint: Endpoint,
        config: SessionConfig,
        now: Instant,
    ) -> (Self, Vec<SessionAction>) {
        let mut session = Self {
            endpoint,
            config,
            state: SessionState::Connecting,
            attempts: 0,
            connection: None,
            next_connection: 0,
            deadline: None,
            assembler: ResponseAssembler::new(),
        };

        info!(endpoint = %session.endpoint, "opening session");

        let mut actions = Vec::new();
        session.begin_connect(now, &mut actions);
        (session, actions)
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Reconnect attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Current attempt or link, if any.
    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Endpoint this session talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Response currently being streamed.
    pub fn in_progress(&self) -> Option<&Response> {
        self.assembler.in_progress()
    }

    /// Next instant at which [`Session::tick`] must be called.
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.deadline
    }

    /// The link for `connection` completed its handshake.
    pub fn handle_link_opened(
        &mut self,
        connection: ConnectionId,
        _now: Instant,
    ) -> Vec<SessionAction> {
        if !self.is_current(connection) || self.state != SessionState::Connecting {
            debug!(%connection, state = %self.state, "dropping stale link");
            return vec![SessionAction::Disconnect { connection }];
        }

        self.state = SessionState::Open;
        self.attempts = 0;
        self.deadline = None;

        info!(%connection, endpoint = %self.endpoint, "session open");
        vec![self.state_changed()]
    }

    /// The connect attempt for `connection` failed before the handshake
    /// completed.
    pub fn handle_link_failed(
        &mut self,
        connection: ConnectionId,
        reason: impl Into<String>,
        now: Instant,
    ) -> Vec<SessionAction> {
        if !self.is_current(connection) || self.state != SessionState::Connecting {
            debug!(%connection, state = %self.state, "ignoring stale connect failure");
            return Vec::new();
        }

        let reason = reason.into();
        warn!(%connection, attempt = self.attempts, %reason, "connect attempt failed");

        self.connection = None;
        let mut actions = vec![SessionAction::Notify(SessionEvent::LinkError { reason })];
        self.schedule_reconnect(now, &mut actions);
        actions
    }

    /// The link for `connection` closed without the owner asking for it.
    ///
    /// Every closure not initiated through [`Session::close`] counts as
    /// abnormal and enters the retry loop.
    pub fn handle_link_closed(
        &mut self,
        connection: ConnectionId,
        reason: impl Into<String>,
        now: Instant,
    ) -> Vec<SessionAction> {
        if !self.is_current(connection)
            || !matches!(self.state, SessionState::Open | SessionState::Connecting)
        {
            debug!(%connection, state = %self.state, "ignoring close of stale link");
            return Vec::new();
        }

        let reason = reason.into();
        warn!(%connection, state = %self.state, %reason, "link closed unexpectedly");

        self.connection = None;
        let mut actions = vec![
            SessionAction::Disconnect { connection },
            SessionAction::Notify(SessionEvent::LinkError { reason }),
        ];
        if let Some(partial) = self.assembler.abandon() {
            actions.push(SessionAction::Notify(SessionEvent::ResponseAbandoned(partial)));
        }
        self.schedule_reconnect(now, &mut actions);
        actions
    }

    /// One text frame arrived on `connection`.
    ///
    /// Undecodable frames are logged and dropped.
    pub fn handle_text(&mut self, connection: ConnectionId, text: &str) -> Vec<SessionAction> {
        if !self.is_current(connection) || self.state != SessionState::Open {
            debug!(%connection, state = %self.state, "ignoring frame from stale link");
            return Vec::new();
        }

        match self.endpoint.kind().decode(text) {
            Ok(fragment) => {
                self.assembler.push(fragment).into_iter().map(SessionAction::Notify).collect()
            },
            Err(error) => {
                warn!(%connection, %error, "dropping malformed frame");
                Vec::new()
            },
        }
    }

    /// Send one request on the open link.
    ///
    /// # Errors
    ///
    /// - `ConnectionUnavailable` unless the session is `Open`; nothing is
    ///   written.
    /// - `ReadOnlyStream` on push-only streams.
    /// - `Protocol` if the request cannot be encoded.
    pub fn send(&mut self, request: &OutgoingRequest) -> Result<Vec<SessionAction>, SessionError> {
        if !self.endpoint.kind().accepts_requests() {
            return Err(SessionError::ReadOnlyStream { kind: self.endpoint.kind().clone() });
        }

        let connection = match (self.state, self.connection) {
            (SessionState::Open, Some(connection)) => connection,
            (state, _) => return Err(SessionError::ConnectionUnavailable { state }),
        };

        let text = request.encode()?;
        debug!(%connection, bytes = text.len(), history = request.history.len(), "sending request");
        Ok(vec![SessionAction::Transmit { connection, text }])
    }

    /// Tick the state machine: handshake timeout and retry scheduling.
    ///
    /// Call when the deadline from [`Session::poll_timeout`] passes. Calling
    /// early is harmless.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionAction> {
        let Some(deadline) = self.deadline else {
            return Vec::new();
        };
        if now < deadline {
            return Vec::new();
        }

        let mut actions = Vec::new();
        match self.state {
            SessionState::Connecting => {
                let reason =
                    format!("handshake timed out after {:?}", self.config.connect_timeout);
                warn!(connection = ?self.connection, attempt = self.attempts, %reason, "connect attempt timed out");

                if let Some(connection) = self.connection.take() {
                    actions.push(SessionAction::Disconnect { connection });
                }
                actions.push(SessionAction::Notify(SessionEvent::LinkError { reason }));
                self.schedule_reconnect(now, &mut actions);
            },
            SessionState::Reconnecting => {
                let max = self.config.max_reconnect_attempts;
                if self.attempts < max {
                    self.attempts += 1;
                }

                if self.attempts >= max {
                    self.fail(&mut actions);
                } else {
                    info!(attempt = self.attempts, max, "reconnecting");
                    self.begin_connect(now, &mut actions);
                }
            },
            SessionState::Open | SessionState::Failed | SessionState::Closed => {
                self.deadline = None;
            },
        }
        actions
    }

    /// Close the session: drop the link and cancel pending timers.
    ///
    /// Idempotent; closing a closed session returns no actions.
    pub fn close(&mut self) -> Vec<SessionAction> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }

        info!(endpoint = %self.endpoint, state = %self.state, "closing session");

        let mut actions = Vec::new();
        if let Some(connection) = self.connection.take() {
            actions.push(SessionAction::Disconnect { connection });
        }
        self.deadline = None;
        self.assembler.abandon();
        self.state = SessionState::Closed;
        actions.push(self.state_changed());
        actions
    }

    fn is_current(&self, connection: ConnectionId) -> bool {
        self.connection == Some(connection)
    }

    fn begin_connect(&mut self, now: Instant, actions: &mut Vec<SessionAction>) {
        let connection = ConnectionId(self.next_connection);
        self.next_connection += 1;

        self.connection = Some(connection);
        self.state = SessionState::Connecting;
        self.deadline = now.checked_add(self.config.connect_timeout);

        debug!(%connection, attempt = self.attempts, "connect attempt");
        actions.push(self.state_changed());
        actions.push(SessionAction::Connect { connection, url: self.endpoint.url() });
    }

    fn schedule_reconnect(&mut self, now: Instant, actions: &mut Vec<SessionAction>) {
        self.state = SessionState::Reconnecting;
        self.deadline = now.checked_add(self.config.reconnect_delay);
        actions.push(self.state_changed());
    }

    fn fail(&mut self, actions: &mut Vec<SessionAction>) {
        self.state = SessionState::Failed;
        self.deadline = None;

        warn!(attempts = self.attempts, endpoint = %self.endpoint, "retry budget exhausted");
        actions.push(self.state_changed());
        actions.push(SessionAction::Notify(SessionEvent::TerminalFailure {
            attempts: self.attempts,
        }));
    }

    fn state_changed(&self) -> SessionAction {
        SessionAction::Notify(SessionEvent::StateChanged {
            state: self.state,
            attempt: self.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;
    use scribe_proto::{Fragment, StreamKind};

    use super::*;

    fn chat_endpoint() -> Endpoint {
        Endpoint::new("ws://localhost:8000", StreamKind::Chat).unwrap()
    }

    fn connect_id(actions: &[SessionAction]) -> ConnectionId {
        actions
            .iter()
            .find_map(|a| match a {
                SessionAction::Connect { connection, .. } => Some(*connection),
                _ => None,
            })
            .expect("connect action")
    }

    fn events(actions: &[SessionAction]) -> Vec<SessionEvent> {
        actions
            .iter()
            .filter_map(|a| match a {
                SessionAction::Notify(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    fn terminal_count(actions: &[SessionAction]) -> usize {
        events(actions).iter().filter(|e| matches!(e, SessionEvent::TerminalFailure { .. })).count()
    }

    /// Open a session and complete its first handshake.
    fn open_session(t0: Instant) -> (Session, ConnectionId) {
        let (mut session, actions) = Session::open(chat_endpoint(), SessionConfig::default(), t0);
        let id = connect_id(&actions);
        session.handle_link_opened(id, t0);
        (session, id)
    }

    /// Fail the current attempt and advance through the reconnect delay.
    /// Returns the actions of both steps.
    fn fail_and_retry(session: &mut Session, now: &mut Instant) -> Vec<SessionAction> {
        let id = session.connection().expect("attempt in flight");
        let mut actions = session.handle_link_failed(id, "refused", *now);
        *now += session.config().reconnect_delay;
        actions.extend(session.tick(*now));
        actions
    }

    #[test]
    fn session_lifecycle() {
        let t0 = Instant::now();
        let (mut session, actions) = Session::open(chat_endpoint(), SessionConfig::default(), t0);

        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(
            actions[1],
            SessionAction::Connect {
                connection: ConnectionId(0),
                url: "ws://localhost:8000/ws/chat".into()
            }
        );
        assert_eq!(session.poll_timeout(), Some(t0 + Duration::from_secs(5)));

        let actions = session.handle_link_opened(ConnectionId(0), t0);
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(
            events(&actions),
            vec![SessionEvent::StateChanged { state: SessionState::Open, attempt: 0 }]
        );
        assert_eq!(session.poll_timeout(), None);

        let actions = session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(actions.contains(&SessionAction::Disconnect { connection: ConnectionId(0) }));
    }

    #[test]
    fn handshake_timeout_enters_reconnecting() {
        let t0 = Instant::now();
        let (mut session, actions) = Session::open(chat_endpoint(), SessionConfig::default(), t0);
        let id = connect_id(&actions);

        // Too early.
        assert!(session.tick(t0 + Duration::from_secs(4)).is_empty());

        let actions = session.tick(t0 + Duration::from_secs(5));
        assert_eq!(session.state(), SessionState::Reconnecting);
        assert_eq!(actions[0], SessionAction::Disconnect { connection: id });
        assert!(
            events(&actions).iter().any(|e| matches!(e, SessionEvent::LinkError { reason } if reason.contains("timed out")))
        );
        assert_eq!(session.poll_timeout(), Some(t0 + Duration::from_secs(8)));

        // A late handshake for the timed-out attempt is refused.
        let actions = session.handle_link_opened(id, t0 + Duration::from_secs(6));
        assert_eq!(actions, vec![SessionAction::Disconnect { connection: id }]);
        assert_eq!(session.state(), SessionState::Reconnecting);
    }

    #[test]
    fn reconnect_uses_constant_delay_and_counts_attempts() {
        let mut now = Instant::now();
        let (mut session, _) = Session::open(chat_endpoint(), SessionConfig::default(), now);

        for expected in 1..=2 {
            let actions = fail_and_retry(&mut session, &mut now);
            assert_eq!(session.state(), SessionState::Connecting);
            assert_eq!(session.attempts(), expected);
            assert_eq!(connect_id(&actions), ConnectionId(u64::from(expected)));
        }
    }

    #[test]
    fn exhausted_budget_fails_once() {
        let mut now = Instant::now();
        let (mut session, _) = Session::open(chat_endpoint(), SessionConfig::default(), now);

        let mut all = Vec::new();
        for _ in 0..2 {
            all.extend(fail_and_retry(&mut session, &mut now));
        }
        assert_eq!(terminal_count(&all), 0);

        // Third loss: the delay still runs, then the budget is spent.
        let id = session.connection().unwrap();
        let mut actions = session.handle_link_failed(id, "refused", now);
        assert_eq!(session.state(), SessionState::Reconnecting);
        now += session.config().reconnect_delay;
        actions.extend(session.tick(now));

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.attempts(), 3);
        assert_eq!(terminal_count(&actions), 1);
        assert!(!actions.iter().any(|a| matches!(a, SessionAction::Connect { .. })));
        assert_eq!(
            events(&actions).last(),
            Some(&SessionEvent::TerminalFailure { attempts: 3 })
        );
        assert_eq!(session.poll_timeout(), None);

        // Nothing further happens, no matter how long we wait.
        assert!(session.tick(now + Duration::from_secs(3600)).is_empty());
        assert!(session.handle_link_failed(id, "refused", now).is_empty());
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn success_resets_retry_budget() {
        let mut now = Instant::now();
        let (mut session, _) = Session::open(chat_endpoint(), SessionConfig::default(), now);

        // Two failures, then success.
        fail_and_retry(&mut session, &mut now);
        fail_and_retry(&mut session, &mut now);
        assert_eq!(session.attempts(), 2);
        let id = session.connection().unwrap();
        session.handle_link_opened(id, now);
        assert_eq!(session.attempts(), 0);

        // Drop the open link: the full budget is available again.
        let mut actions = session.handle_link_closed(id, "reset by peer", now);
        now += session.config().reconnect_delay;
        actions.extend(session.tick(now));
        actions.extend(fail_and_retry(&mut session, &mut now));
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.attempts(), 2);
        assert_eq!(terminal_count(&actions), 0);

        let actions = fail_and_retry(&mut session, &mut now);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(terminal_count(&actions), 1);
    }

    #[test]
    fn default_budget_allows_three_connects() {
        let mut now = Instant::now();
        let (mut session, actions) = Session::open(chat_endpoint(), SessionConfig::default(), now);
        let mut all = actions;

        while session.state() != SessionState::Failed {
            all.extend(fail_and_retry(&mut session, &mut now));
        }

        let connects = all.iter().filter(|a| matches!(a, SessionAction::Connect { .. })).count();
        assert_eq!(connects, 3);
        assert_eq!(terminal_count(&all), 1);
    }

    #[test]
    fn zero_budget_fails_after_first_loss() {
        let t0 = Instant::now();
        let config = SessionConfig { max_reconnect_attempts: 0, ..Default::default() };
        let (mut session, actions) = Session::open(chat_endpoint(), config, t0);
        session.handle_link_failed(connect_id(&actions), "refused", t0);
        assert_eq!(session.state(), SessionState::Reconnecting);

        let actions = session.tick(t0 + Duration::from_secs(3));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.attempts(), 0);
        assert_eq!(terminal_count(&actions), 1);
    }

    #[test]
    fn unschedulable_durations_disable_timers() {
        let t0 = Instant::now();
        let config = SessionConfig {
            connect_timeout: Duration::from_secs(u64::MAX),
            reconnect_delay: Duration::MAX,
            max_reconnect_attempts: 3,
        };
        let (mut session, actions) = Session::open(chat_endpoint(), config, t0);
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.poll_timeout(), None);

        session.handle_link_failed(connect_id(&actions), "refused", t0);
        assert_eq!(session.state(), SessionState::Reconnecting);
        assert_eq!(session.poll_timeout(), None);
        assert!(session.tick(t0 + Duration::from_secs(3600)).is_empty());
    }

    #[test]
    fn open_link_closure_reconnects() {
        let t0 = Instant::now();
        let (mut session, id) = open_session(t0);

        let actions = session.handle_link_closed(id, "abnormal closure", t0);
        assert_eq!(session.state(), SessionState::Reconnecting);
        assert_eq!(actions[0], SessionAction::Disconnect { connection: id });

        let actions = session.tick(t0 + Duration::from_secs(3));
        assert_eq!(session.state(), SessionState::Connecting);
        assert_ne!(connect_id(&actions), id);
    }

    #[test]
    fn closure_mid_response_abandons_it() {
        let t0 = Instant::now();
        let (mut session, id) = open_session(t0);
        session.handle_text(id, r#"{"chunk": "half"}"#);

        let actions = session.handle_link_closed(id, "gone", t0);
        assert!(events(&actions).iter().any(
            |e| matches!(e, SessionEvent::ResponseAbandoned(r) if r.content == "half" && !r.finished)
        ));
        assert!(session.in_progress().is_none());
    }

    #[test]
    fn streamed_fragments_assemble() {
        let t0 = Instant::now();
        let (mut session, id) = open_session(t0);

        let mut actions = session.handle_text(id, r#"{"chunk": "a"}"#);
        actions.extend(session.handle_text(id, r#"{"chunk": "b"}"#));
        actions.extend(session.handle_text(id, r#"{"done": true}"#));

        let finished: Vec<_> = events(&actions)
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::ResponseFinished(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].content, "ab");
        assert!(finished[0].finished);
    }

    #[test]
    fn fragment_error_keeps_session_open() {
        let t0 = Instant::now();
        let (mut session, id) = open_session(t0);
        session.handle_text(id, r#"{"chunk": "partial"}"#);

        let actions = session.handle_text(id, r#"{"error": "x"}"#);
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.poll_timeout(), None);
        assert!(!actions.iter().any(|a| matches!(
            a,
            SessionAction::Disconnect { .. } | SessionAction::Connect { .. }
        )));
        assert!(matches!(
            &events(&actions)[0],
            SessionEvent::FragmentError { error, .. } if error.message == "x"
        ));
    }

    #[test]
    fn malformed_frame_is_dropped() {
        let t0 = Instant::now();
        let (mut session, id) = open_session(t0);
        assert!(session.handle_text(id, "<html>").is_empty());
        assert_eq!(session.state(), SessionState::Open);
    }

    #[test]
    fn frames_from_stale_link_are_ignored() {
        let t0 = Instant::now();
        let (mut session, old) = open_session(t0);
        session.handle_link_closed(old, "gone", t0);
        let actions = session.tick(t0 + Duration::from_secs(3));
        let new = connect_id(&actions);
        session.handle_link_opened(new, t0 + Duration::from_secs(3));

        assert!(session.handle_text(old, r#"{"chunk": "ghost"}"#).is_empty());
        assert!(session.handle_link_closed(old, "late", t0).is_empty());
        assert_eq!(session.state(), SessionState::Open);
        assert!(session.in_progress().is_none());
    }

    #[test]
    fn send_requires_open() {
        let t0 = Instant::now();
        let (mut session, id) = open_session(t0);
        let request = OutgoingRequest::new("hola").unwrap();

        let actions = session.send(&request).unwrap();
        assert!(matches!(
            &actions[..],
            [SessionAction::Transmit { connection, text }] if *connection == id && text.contains("hola")
        ));

        session.handle_link_closed(id, "gone", t0);
        assert_eq!(session.state(), SessionState::Reconnecting);
        assert!(matches!(
            session.send(&request),
            Err(SessionError::ConnectionUnavailable { state: SessionState::Reconnecting })
        ));
    }

    #[test]
    fn transcription_stream_is_read_only() {
        let t0 = Instant::now();
        let endpoint =
            Endpoint::new("ws://localhost", StreamKind::Transcription { encounter_id: 9 }).unwrap();
        let (mut session, actions) = Session::open(endpoint, SessionConfig::default(), t0);
        let id = connect_id(&actions);
        session.handle_link_opened(id, t0);

        let request = OutgoingRequest::new("hola").unwrap();
        assert!(matches!(session.send(&request), Err(SessionError::ReadOnlyStream { .. })));

        let mut actions = session.handle_text(id, r#"{"status": "processing"}"#);
        actions.extend(session.handle_text(id, r#"{"status": "completed", "content": "Paciente"}"#));
        assert!(events(&actions).iter().any(
            |e| matches!(e, SessionEvent::ResponseFinished(r) if r.content == "Paciente")
        ));
    }

    #[test]
    fn close_is_idempotent() {
        let t0 = Instant::now();
        let (mut session, _) = open_session(t0);

        let first = session.close();
        assert_eq!(
            events(&first),
            vec![SessionEvent::StateChanged { state: SessionState::Closed, attempt: 0 }]
        );
        assert!(session.close().is_empty());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn close_cancels_pending_retry() {
        let t0 = Instant::now();
        let (mut session, id) = open_session(t0);
        session.handle_link_closed(id, "gone", t0);
        assert!(session.poll_timeout().is_some());

        let actions = session.close();
        assert!(!actions.iter().any(|a| matches!(a, SessionAction::Disconnect { .. })));
        assert_eq!(session.poll_timeout(), None);
        assert!(session.tick(t0 + Duration::from_secs(60)).is_empty());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn close_after_failure() {
        let t0 = Instant::now();
        let config = SessionConfig { max_reconnect_attempts: 0, ..Default::default() };
        let (mut session, actions) = Session::open(chat_endpoint(), config, t0);
        session.handle_link_failed(connect_id(&actions), "refused", t0);
        session.tick(t0 + Duration::from_secs(3));

        assert_eq!(session.state(), SessionState::Failed);
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    proptest! {
        /// However failures and successes interleave, the attempt counter stays
        /// within budget and the terminal notification fires at most once.
        #[test]
        fn retry_budget_is_respected(
            max in 0u32..5,
            outcomes in proptest::collection::vec(any::<bool>(), 1..40),
        ) {
            let mut now = Instant::now();
            let config = SessionConfig { max_reconnect_attempts: max, ..Default::default() };
            let (mut session, _) = Session::open(chat_endpoint(), config, now);
            let mut terminal = 0;

            for succeed in outcomes {
                let Some(id) = session.connection() else { break };
                let actions = if succeed {
                    let mut actions = session.handle_link_opened(id, now);
                    actions.extend(session.handle_link_closed(id, "drop", now));
                    actions
                } else {
                    session.handle_link_failed(id, "refused", now)
                };
                terminal += terminal_count(&actions);
                prop_assert!(session.attempts() <= max);

                now += Duration::from_secs(3);
                let actions = session.tick(now);
                terminal += terminal_count(&actions);
                prop_assert!(session.attempts() <= max);
            }

            prop_assert!(terminal <= 1);
            prop_assert_eq!(terminal == 1, session.state() == SessionState::Failed);
        }
    }

    #[test]
    fn first_chunk_starts_response() {
        let t0 = Instant::now();
        let (mut session, id) = open_session(t0);
        let fragment = Fragment::chunk("z").encode().unwrap();
        let actions = session.handle_text(id, &fragment);
        assert!(matches!(events(&actions)[0], SessionEvent::ResponseStarted { .. }));
    }
}
