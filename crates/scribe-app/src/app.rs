//! Chat application state machine.

use scribe_core::{Response, ResponseId, SessionEvent, SessionState};
use scribe_proto::{HistoryTurn, OutgoingRequest, StreamKind};
use tracing::debug;

use crate::{
    AppAction, AppEvent, Author, ChatMessage,
    commands::{self, Command},
};

/// Shown once the retry budget is spent.
pub const RETRIES_EXHAUSTED: &str =
    "Failed to connect after several attempts. Use /restart to try again.";

/// Shown when a message is typed while the link is down.
pub const CONNECTION_LOST: &str = "Connection lost. Waiting for the session to reconnect.";

/// Shown when a link attempt or an open link fails.
pub const CONNECTION_ERROR: &str = "Connection error. Attempting to reconnect...";

/// Application state.
///
/// Owns the conversation and everything the interface displays. Inputs
/// arrive as [`AppEvent`]s; effects leave as [`AppAction`]s.
#[derive(Debug, Clone)]
pub struct App {
    kind: StreamKind,
    messages: Vec<ChatMessage>,
    status: SessionState,
    is_loading: bool,
    error: Option<String>,
}

impl App {
    /// Create app state for a session on `kind`.
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            messages: Vec::new(),
            status: SessionState::Connecting,
            is_loading: false,
            error: None,
        }
    }

    /// Conversation so far.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Last known session state.
    pub fn status(&self) -> SessionState {
        self.status
    }

    /// Waiting for a response.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Inline error, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether to show the "connecting" indicator.
    pub fn is_connecting(&self) -> bool {
        matches!(self.status, SessionState::Connecting | SessionState::Reconnecting)
    }

    /// Whether the user can send right now.
    pub fn can_send(&self) -> bool {
        self.kind.accepts_requests() && self.status == SessionState::Open && !self.is_loading
    }

    /// Conversation as request history.
    pub fn history(&self) -> Vec<HistoryTurn> {
        self.messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| HistoryTurn::new(m.author.role(), m.content.clone()))
            .collect()
    }

    /// Process one event.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::Input(line) => self.handle_command(commands::parse(&line)),
            AppEvent::Session(event) => self.handle_session(event),
            AppEvent::SendFailed { reason } => {
                self.unwind_pending();
                self.error = Some(reason);
                vec![AppAction::Render]
            },
        }
    }

    fn handle_command(&mut self, command: Command) -> Vec<AppAction> {
        match command {
            Command::Message { content } => self.submit(content),
            Command::Restart => {
                debug!(status = %self.status, "restart requested");
                self.status = SessionState::Connecting;
                self.is_loading = false;
                self.error = None;
                self.settle_streaming();
                vec![AppAction::Restart, AppAction::Render]
            },
            Command::Clear => {
                self.messages.clear();
                self.error = None;
                vec![AppAction::Render]
            },
            Command::History => vec![AppAction::ShowHistory],
            Command::Quit => vec![AppAction::Quit],
            Command::Unknown { input } => {
                self.error = Some(format!("Unknown command: {input}"));
                vec![AppAction::Render]
            },
        }
    }

    fn submit(&mut self, content: String) -> Vec<AppAction> {
        if content.is_empty() {
            return Vec::new();
        }

        if !self.kind.accepts_requests() {
            self.error = Some(format!("The {} stream is read-only.", self.kind));
            return vec![AppAction::Render];
        }

        if self.status != SessionState::Open {
            self.error = Some(self.unavailable_message().to_owned());
            return vec![AppAction::Render];
        }

        if self.is_loading {
            self.error = Some("Wait for the current answer to finish.".to_owned());
            return vec![AppAction::Render];
        }

        let Ok(request) = OutgoingRequest::new(&content) else {
            return Vec::new();
        };
        let request = request.with_history(self.history());

        self.messages.push(ChatMessage::user(request.message.clone()));
        self.is_loading = true;
        self.error = None;

        vec![AppAction::Send { request }, AppAction::Render]
    }

    fn handle_session(&mut self, event: SessionEvent) -> Vec<AppAction> {
        match event {
            SessionEvent::StateChanged { state, .. } => {
                self.status = state;
                match state {
                    SessionState::Open => self.error = None,
                    SessionState::Failed => {
                        self.is_loading = false;
                        self.error = Some(RETRIES_EXHAUSTED.to_owned());
                    },
                    SessionState::Connecting
                    | SessionState::Reconnecting
                    | SessionState::Closed => {},
                }
            },
            SessionEvent::LinkError { .. } => {
                self.is_loading = false;
                self.error = Some(CONNECTION_ERROR.to_owned());
            },
            SessionEvent::ResponseStarted { response } => {
                self.messages.push(ChatMessage::assistant(response));
            },
            SessionEvent::Chunk { response, text } => {
                if let Some(message) = self.message_mut(response) {
                    message.content.push_str(&text);
                }
            },
            SessionEvent::ResponseFinished(response) => {
                self.settle(&response);
                self.is_loading = false;
                self.error = None;
            },
            SessionEvent::ResponseAbandoned(response) => {
                self.settle(&response);
                self.is_loading = false;
            },
            SessionEvent::FragmentError { error, partial } => {
                if let Some(partial) = partial {
                    self.settle(&partial);
                }
                self.is_loading = false;
                self.error = Some(error.message);
            },
            SessionEvent::SendRejected { state } => {
                self.status = state;
                self.unwind_pending();
                self.error = Some(self.unavailable_message().to_owned());
            },
            SessionEvent::TerminalFailure { .. } => {
                self.is_loading = false;
                self.error = Some(RETRIES_EXHAUSTED.to_owned());
            },
        }
        vec![AppAction::Render]
    }

    fn unavailable_message(&self) -> &'static str {
        if self.status == SessionState::Failed { RETRIES_EXHAUSTED } else { CONNECTION_LOST }
    }

    fn message_mut(&mut self, response: ResponseId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().rev().find(|m| m.response == Some(response))
    }

    /// Stop streaming `response`, taking its content as final.
    fn settle(&mut self, response: &Response) {
        match self.message_mut(response.id) {
            Some(message) => {
                message.content.clone_from(&response.content);
                message.streaming = false;
            },
            None => {
                let mut message = ChatMessage::assistant(response.id);
                message.content.clone_from(&response.content);
                message.streaming = false;
                self.messages.push(message);
            },
        }
    }

    fn settle_streaming(&mut self) {
        for message in &mut self.messages {
            message.streaming = false;
        }
    }

    /// Drop the user message whose request never reached the link.
    fn unwind_pending(&mut self) {
        if self.is_loading && self.messages.last().is_some_and(|m| m.author == Author::User) {
            self.messages.pop();
        }
        self.is_loading = false;
    }
}
