//! Terminal event loop.
//!
//! [`Terminal`] owns the app, the renderer and the live session, and carries
//! out the app's actions. [`run`] feeds it stdin lines, session events and
//! Ctrl-C over the WebSocket transport; tests feed it the same events over a
//! scripted one.

use std::{
    collections::VecDeque,
    io::{self, Write},
};

use scribe_app::{App, AppAction, AppEvent};
use scribe_client::{ChannelObserver, SessionHandle, Transport};
use scribe_core::{Endpoint, SessionConfig, SessionEvent, SessionState, SystemEnv};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::info;

use crate::{Args, CliError, Renderer};

/// Whether the loop keeps going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Wait for the next event.
    Continue,
    /// The user quit; the session is already closed.
    Quit,
}

/// App, renderer and session wired together.
pub struct Terminal<T: Transport + Clone, W: Write> {
    app: App,
    renderer: Renderer<W>,
    transport: T,
    endpoint: Endpoint,
    config: SessionConfig,
    session: SessionHandle,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<T: Transport + Clone, W: Write> Terminal<T, W> {
    /// Open a session on `endpoint` and print the initial status.
    ///
    /// # Errors
    ///
    /// If `out` cannot be written.
    pub fn open(
        transport: T,
        endpoint: Endpoint,
        config: SessionConfig,
        out: W,
    ) -> Result<Self, CliError> {
        let app = App::new(endpoint.kind().clone());
        let (session, events) = open_session(&transport, &endpoint, &config);
        let mut terminal = Self {
            app,
            renderer: Renderer::new(out),
            transport,
            endpoint,
            config,
            session,
            events,
        };
        terminal.renderer.render(&terminal.app)?;
        Ok(terminal)
    }

    /// App state as last rendered.
    pub fn app(&self) -> &App {
        &self.app
    }

    /// State of the current session.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Next event from the current session.
    ///
    /// `None` once that session has shut down.
    pub async fn next_session_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Feed `event` to the app and carry out every action it asks for.
    ///
    /// # Errors
    ///
    /// If the terminal cannot be written.
    pub async fn handle(&mut self, event: AppEvent) -> Result<Flow, CliError> {
        let mut actions = VecDeque::from(self.app.handle(event));
        while let Some(action) = actions.pop_front() {
            match action {
                AppAction::Render => self.renderer.render(&self.app)?,
                AppAction::ShowHistory => self.renderer.history(&self.app)?,
                AppAction::Send { request } => {
                    // The session may have dropped the link before the app
                    // saw the state change.
                    if let Err(err) = self.session.send(request) {
                        let failed = AppEvent::SendFailed { reason: err.to_string() };
                        actions.extend(self.app.handle(failed));
                    }
                },
                AppAction::Restart => {
                    info!(endpoint = %self.endpoint, "restarting session");
                    self.session.close().await;
                    (self.session, self.events) =
                        open_session(&self.transport, &self.endpoint, &self.config);
                },
                AppAction::Quit => {
                    self.session.close().await;
                    return Ok(Flow::Quit);
                },
            }
        }
        Ok(Flow::Continue)
    }

    /// Close the session. Idempotent.
    pub async fn close(&mut self) {
        self.session.close().await;
    }

    /// Consume the terminal, returning the output writer.
    pub fn into_output(self) -> W {
        self.renderer.into_inner()
    }
}

/// Run the client until the user quits, stdin closes, or Ctrl-C.
///
/// # Errors
///
/// If the endpoint is invalid or the terminal cannot be written.
pub async fn run(args: Args) -> Result<(), CliError> {
    let mut terminal =
        Terminal::open(args.transport(), args.endpoint()?, args.config(), io::stdout())?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let event = tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => AppEvent::Input(line),
                None => break,
            },
            Some(event) = terminal.next_session_event() => AppEvent::Session(event),
            _ = tokio::signal::ctrl_c() => break,
        };

        if terminal.handle(event).await? == Flow::Quit {
            return Ok(());
        }
    }

    terminal.close().await;
    Ok(())
}

fn open_session<T: Transport + Clone>(
    transport: &T,
    endpoint: &Endpoint,
    config: &SessionConfig,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
    let (observer, events) = ChannelObserver::new();
    let handle =
        SessionHandle::open(transport.clone(), SystemEnv, endpoint.clone(), config.clone(), observer);
    (handle, events)
}
