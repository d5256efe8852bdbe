//! In-memory transport driven by the test.
//!
//! Each connect attempt consumes the next planned [`ConnectOutcome`] (or the
//! default once the plan is empty). Accepted links hand the test a
//! [`ServerEnd`] to push frames, drop the link, and inspect what the client
//! wrote.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use scribe_client::{Transport, TransportError, TransportReceiver, TransportSender};
use scribe_proto::{Fragment, OutgoingRequest};
use tokio::sync::mpsc;

/// What the next connect attempt does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Complete the handshake.
    Accept,
    /// Fail immediately with this reason.
    Refuse(String),
    /// Never complete; only the session's connect timeout ends it.
    Hang,
}

enum Inbound {
    Text(String),
    Close,
    Error(String),
}

/// Server side of one accepted link.
#[derive(Clone)]
pub struct ServerEnd {
    url: String,
    to_client: mpsc::UnboundedSender<Inbound>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl ServerEnd {
    /// URL the client connected to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver a raw text frame.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.to_client.send(Inbound::Text(text.into()));
    }

    /// Deliver an encoded fragment.
    pub fn push_fragment(&self, fragment: &Fragment) {
        if let Ok(text) = fragment.encode() {
            self.push(text);
        }
    }

    /// Close the link from the server side.
    pub fn hang_up(&self) {
        let _ = self.to_client.send(Inbound::Close);
    }

    /// Break the link with a read error.
    pub fn break_link(&self, reason: impl Into<String>) {
        let _ = self.to_client.send(Inbound::Error(reason.into()));
    }

    /// Frames the client wrote, in order.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    /// Frames the client wrote, decoded as requests.
    pub fn requests(&self) -> Vec<OutgoingRequest> {
        lock(&self.sent).iter().filter_map(|text| OutgoingRequest::decode(text).ok()).collect()
    }

    /// Whether the client closed its write half.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Inner {
    plan: VecDeque<ConnectOutcome>,
    fallback: Option<ConnectOutcome>,
    attempts: Vec<String>,
    links: Vec<ServerEnd>,
}

/// Transport whose behaviour is scripted by the test.
///
/// Clones share state, so the test keeps one clone and hands another to the
/// session.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedTransport {
    /// Transport that accepts every handshake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for the next connect attempts.
    #[must_use]
    pub fn then(self, outcome: ConnectOutcome) -> Self {
        lock(&self.inner).plan.push_back(outcome);
        self
    }

    /// Outcome for every attempt once the plan is exhausted.
    pub fn set_fallback(&self, outcome: ConnectOutcome) {
        lock(&self.inner).fallback = Some(outcome);
    }

    /// Queue an outcome on a transport already handed to a session.
    pub fn plan(&self, outcome: ConnectOutcome) {
        lock(&self.inner).plan.push_back(outcome);
    }

    /// Number of connect attempts so far.
    pub fn attempts(&self) -> usize {
        lock(&self.inner).attempts.len()
    }

    /// URLs of all connect attempts.
    pub fn attempted_urls(&self) -> Vec<String> {
        lock(&self.inner).attempts.clone()
    }

    /// Accepted links, oldest first.
    pub fn links(&self) -> Vec<ServerEnd> {
        lock(&self.inner).links.clone()
    }

    /// Most recently accepted link.
    pub fn last_link(&self) -> Option<ServerEnd> {
        lock(&self.inner).links.last().cloned()
    }

    fn next_outcome(&self, url: &str) -> ConnectOutcome {
        let mut inner = lock(&self.inner);
        inner.attempts.push(url.to_owned());
        inner
            .plan
            .pop_front()
            .or_else(|| inner.fallback.clone())
            .unwrap_or(ConnectOutcome::Accept)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Sender = ScriptedSender;
    type Receiver = ScriptedReceiver;

    async fn connect(&self, url: &str) -> Result<(ScriptedSender, ScriptedReceiver), TransportError> {
        match self.next_outcome(url) {
            ConnectOutcome::Accept => {},
            ConnectOutcome::Refuse(reason) => return Err(TransportError::Connect(reason)),
            ConnectOutcome::Hang => std::future::pending::<()>().await,
        }

        let (to_client, from_server) = mpsc::unbounded_channel();
        let end = ServerEnd {
            url: url.to_owned(),
            to_client,
            sent: Arc::default(),
            closed: Arc::default(),
        };
        let sender = ScriptedSender { sent: Arc::clone(&end.sent), closed: Arc::clone(&end.closed) };
        lock(&self.inner).links.push(end);

        Ok((sender, ScriptedReceiver { from_server }))
    }
}

/// Client write half of a scripted link.
pub struct ScriptedSender {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl TransportSender for ScriptedSender {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Send("link closed".into()));
        }
        lock(&self.sent).push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Client read half of a scripted link.
pub struct ScriptedReceiver {
    from_server: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl TransportReceiver for ScriptedReceiver {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        match self.from_server.recv().await {
            Some(Inbound::Text(text)) => Ok(Some(text)),
            Some(Inbound::Close) | None => Ok(None),
            Some(Inbound::Error(reason)) => Err(TransportError::Receive(reason)),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
