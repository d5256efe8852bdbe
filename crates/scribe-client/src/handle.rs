//! Session runtime.
//!
//! ```text
//! SessionHandle::open()
//!   └─ spawns session task ──► tokio::spawn(Driver::run)
//!        │
//!        ├── SessionHandle ──► mpsc ──►┤ (commands: Send, Close)
//!        ├── SessionHandle ◄── watch ◄─┤ (current SessionState)
//!        ├── connect task  ──► mpsc ──►┤ (Opened / Failed)
//!        ├── reader task   ──► mpsc ──►┤ (Text / Closed)
//!        └── SessionObserver ◄─────────┘ (SessionEvent)
//! ```
//!
//! The session task is the only place the [`Session`] is touched, so every
//! reaction runs sequentially. Child tasks never see the session; they post
//! events tagged with their [`ConnectionId`] and the state machine discards
//! the ones that went stale.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use scribe_core::{
    ConnectionId, Endpoint, Environment, Session, SessionAction, SessionConfig, SessionError,
    SessionEvent, SessionState,
};
use scribe_proto::{OutgoingRequest, StreamKind};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{ClientError, SessionObserver, Transport, TransportReceiver, TransportSender};

/// Caller-facing handle to a running session.
///
/// Dropping the handle aborts the session task without emitting further
/// events. Use [`SessionHandle::close`] for an orderly shutdown.
#[derive(Debug)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    kind: StreamKind,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Open a session and start connecting.
    ///
    /// Never fails: connect errors enter the retry loop and are reported to
    /// `observer`. Must be called from within a tokio runtime.
    pub fn open<T, E, O>(
        transport: T,
        env: E,
        endpoint: Endpoint,
        config: SessionConfig,
        observer: O,
    ) -> Self
    where
        T: Transport,
        E: Environment,
        O: SessionObserver,
    {
        let kind = endpoint.kind().clone();
        let (session, actions) = Session::open(endpoint, config, env.now());

        let (state_tx, state_rx) = watch::channel(session.state());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (links_tx, links_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            session,
            transport: Arc::new(transport),
            env,
            observer,
            commands: commands_rx,
            links: links_rx,
            links_tx,
            state: state_tx,
            connecting: None,
            link: None,
        };
        let task = tokio::spawn(driver.run(actions));

        Self { commands: commands_tx, state: state_rx, kind, task: Some(task) }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Stream this session is attached to.
    pub fn kind(&self) -> &StreamKind {
        &self.kind
    }

    /// Queue one request for the open link.
    ///
    /// # Errors
    ///
    /// - `ConnectionUnavailable` if the session is not `Open`. Checked
    ///   synchronously; nothing is queued or written.
    /// - `ReadOnlyStream` on push-only streams.
    pub fn send(&self, request: OutgoingRequest) -> Result<(), ClientError> {
        if !self.kind.accepts_requests() {
            return Err(ClientError::ReadOnlyStream { kind: self.kind.clone() });
        }

        let state = self.state();
        if state != SessionState::Open {
            return Err(ClientError::ConnectionUnavailable { state });
        }

        self.commands
            .send(Command::Send(request))
            .map_err(|_| ClientError::ConnectionUnavailable { state: SessionState::Closed })
    }

    /// Close the session and wait for its task to finish.
    ///
    /// Once this returns the observer receives no further events. Idempotent.
    pub async fn close(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        // Send fails only if the task is already gone.
        let _ = self.commands.send(Command::Close);
        if let Err(err) = task.await {
            warn!(%err, "session task ended abnormally");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum Command {
    Send(OutgoingRequest),
    Close,
}

enum LinkEvent<T: Transport> {
    Opened { connection: ConnectionId, sender: T::Sender, receiver: T::Receiver },
    Failed { connection: ConnectionId, reason: String },
    Text { connection: ConnectionId, text: String },
    Closed { connection: ConnectionId, reason: String },
}

enum Wake<T: Transport> {
    Command(Option<Command>),
    Link(LinkEvent<T>),
    Timer,
}

struct Link<T: Transport> {
    connection: ConnectionId,
    sender: T::Sender,
    reader: JoinHandle<()>,
}

/// Owns the session inside its task and interprets its actions.
struct Driver<T: Transport, E: Environment, O: SessionObserver> {
    session: Session,
    transport: Arc<T>,
    env: E,
    observer: O,
    commands: mpsc::UnboundedReceiver<Command>,
    links: mpsc::UnboundedReceiver<LinkEvent<T>>,
    links_tx: mpsc::UnboundedSender<LinkEvent<T>>,
    state: watch::Sender<SessionState>,
    connecting: Option<(ConnectionId, JoinHandle<()>)>,
    link: Option<Link<T>>,
}

impl<T: Transport, E: Environment, O: SessionObserver> Driver<T, E, O> {
    async fn run(mut self, initial: Vec<SessionAction>) {
        self.execute(initial).await;

        loop {
            let env = self.env.clone();
            let deadline = self.session.poll_timeout();
            let timer = async move {
                match deadline {
                    Some(deadline) => env.sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                Some(event) = self.links.recv() => Wake::Link(event),
                () = timer => Wake::Timer,
            };

            match wake {
                Wake::Command(Some(Command::Send(request))) => self.handle_send(&request).await,
                Wake::Command(Some(Command::Close) | None) => {
                    let actions = self.session.close();
                    self.execute(actions).await;
                    break;
                },
                Wake::Link(event) => self.handle_link(event).await,
                Wake::Timer => {
                    let now = self.env.now();
                    let actions = self.session.tick(now);
                    self.execute(actions).await;
                },
            }
        }

        debug!(endpoint = %self.session.endpoint(), "session task finished");
    }

    async fn handle_send(&mut self, request: &OutgoingRequest) {
        match self.session.send(request) {
            Ok(actions) => self.execute(actions).await,
            Err(SessionError::ConnectionUnavailable { state }) => {
                // Link dropped between the handle's check and now.
                debug!(%state, "request rejected");
                self.observer.on_event(SessionEvent::SendRejected { state });
            },
            Err(err) => warn!(%err, "request dropped"),
        }
    }

    async fn handle_link(&mut self, event: LinkEvent<T>) {
        let now = self.env.now();
        let actions = match event {
            LinkEvent::Opened { connection, sender, receiver } => {
                self.finish_connecting(connection);
                let actions = self.session.handle_link_opened(connection, now);

                if self.session.state() == SessionState::Open
                    && self.session.connection() == Some(connection)
                {
                    let reader = self.spawn_reader(connection, receiver);
                    self.link = Some(Link { connection, sender, reader });
                } else {
                    close_sender(sender, &self.env, self.session.config().connect_timeout).await;
                }
                actions
            },
            LinkEvent::Failed { connection, reason } => {
                self.finish_connecting(connection);
                self.session.handle_link_failed(connection, reason, now)
            },
            LinkEvent::Text { connection, text } => self.session.handle_text(connection, &text),
            LinkEvent::Closed { connection, reason } => {
                self.session.handle_link_closed(connection, reason, now)
            },
        };
        self.execute(actions).await;
    }

    async fn execute(&mut self, actions: Vec<SessionAction>) {
        let mut queue = VecDeque::from(actions);

        while let Some(action) = queue.pop_front() {
            match action {
                SessionAction::Connect { connection, url } => self.spawn_connect(connection, url),
                SessionAction::Transmit { connection, text } => {
                    let result = match self.link.as_mut() {
                        Some(link) if link.connection == connection => link.sender.send(text).await,
                        _ => {
                            debug!(%connection, "transmit for dropped link");
                            continue;
                        },
                    };

                    if let Err(err) = result {
                        warn!(%connection, %err, "write failed");
                        let now = self.env.now();
                        queue.extend(self.session.handle_link_closed(connection, err.to_string(), now));
                    }
                },
                SessionAction::Disconnect { connection } => self.disconnect(connection).await,
                SessionAction::Notify(event) => {
                    // The handle reports a state before observers hear of it.
                    if let SessionEvent::StateChanged { state, .. } = &event {
                        self.state.send_replace(*state);
                    }
                    self.observer.on_event(event);
                },
            }
        }

        self.state.send_replace(self.session.state());
    }

    fn spawn_connect(&mut self, connection: ConnectionId, url: String) {
        let transport = Arc::clone(&self.transport);
        let tx = self.links_tx.clone();

        let task = tokio::spawn(async move {
            let event = match transport.connect(&url).await {
                Ok((sender, receiver)) => LinkEvent::Opened { connection, sender, receiver },
                Err(err) => LinkEvent::Failed { connection, reason: err.to_string() },
            };
            let _ = tx.send(event);
        });

        if let Some((_, previous)) = self.connecting.replace((connection, task)) {
            previous.abort();
        }
    }

    fn spawn_reader(&self, connection: ConnectionId, mut receiver: T::Receiver) -> JoinHandle<()> {
        let tx = self.links_tx.clone();

        tokio::spawn(async move {
            let reason = loop {
                match receiver.recv().await {
                    Ok(Some(text)) => {
                        if tx.send(LinkEvent::Text { connection, text }).is_err() {
                            return;
                        }
                    },
                    Ok(None) => break "closed by peer".to_owned(),
                    Err(err) => break err.to_string(),
                }
            };
            let _ = tx.send(LinkEvent::Closed { connection, reason });
        })
    }

    fn finish_connecting(&mut self, connection: ConnectionId) {
        // The connect task already ended; dropping its handle detaches nothing.
        let _ = self.connecting.take_if(|(id, _)| *id == connection);
    }

    async fn disconnect(&mut self, connection: ConnectionId) {
        if let Some((_, task)) = self.connecting.take_if(|(id, _)| *id == connection) {
            debug!(%connection, "aborting connect attempt");
            task.abort();
        }

        if let Some(link) = self.link.take_if(|link| link.connection == connection) {
            debug!(%connection, "closing link");
            link.reader.abort();
            close_sender(link.sender, &self.env, self.session.config().connect_timeout).await;
        }
    }
}

/// Close a write half, giving up after `timeout`.
///
/// A timeout past the clock's range waits for the close to finish.
async fn close_sender<S: TransportSender, E: Environment>(mut sender: S, env: &E, timeout: Duration) {
    let Some(deadline) = env.now().checked_add(timeout) else {
        sender.close().await;
        return;
    };
    tokio::select! {
        () = sender.close() => {},
        () = env.sleep_until(deadline) => debug!("link close timed out"),
    }
}

impl<T: Transport, E: Environment, O: SessionObserver> Drop for Driver<T, E, O> {
    fn drop(&mut self) {
        if let Some((_, task)) = self.connecting.take() {
            task.abort();
        }
        if let Some(link) = self.link.take() {
            link.reader.abort();
        }
    }
}
