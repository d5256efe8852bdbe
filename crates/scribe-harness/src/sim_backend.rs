//! Simulated chat and transcription backend.
//!
//! Speaks the same WebSocket JSON protocol as the real backend: chat answers
//! stream as word chunks followed by an empty `done` fragment, undecodable
//! requests get an `invalid_format` error, and transcription sockets push a
//! `processing` update followed by the `completed` transcript.

use std::error::Error;

use futures_util::{SinkExt, StreamExt};
use scribe_proto::{Fragment, OutgoingRequest, TranscriptionStatus, TranscriptionUpdate};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};
use tracing::debug;
use turmoil::net::{TcpListener, TcpStream};

type BoxError = Box<dyn Error + Send + Sync>;

/// Backend host for turmoil simulations.
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    close_after: Option<usize>,
    fail_on: Option<String>,
    transcript: Option<String>,
    require_token: Option<String>,
}

impl SimBackend {
    /// Port the backend listens on.
    pub const PORT: u16 = 8000;

    /// Backend that answers every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop each link after answering `requests` requests.
    #[must_use]
    pub fn close_after(mut self, requests: usize) -> Self {
        self.close_after = Some(requests);
        self
    }

    /// Answer `message` with a partial chunk and a `stream_error`.
    #[must_use]
    pub fn fail_on(mut self, message: impl Into<String>) -> Self {
        self.fail_on = Some(message.into());
        self
    }

    /// Transcript pushed on transcription sockets.
    #[must_use]
    pub fn transcript(mut self, text: impl Into<String>) -> Self {
        self.transcript = Some(text.into());
        self
    }

    /// Reject handshakes that lack the `access_token=<token>` cookie.
    #[must_use]
    pub fn require_token(mut self, token: impl Into<String>) -> Self {
        self.require_token = Some(token.into());
        self
    }

    /// Answer the backend gives to `request`.
    pub fn answer(request: &OutgoingRequest) -> String {
        format!("echo: {} ({} prior turns)", request.message, request.history.len())
    }

    /// Accept links forever.
    ///
    /// # Errors
    ///
    /// If the listener cannot be bound or accepting fails.
    pub async fn serve(self) -> turmoil::Result {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", Self::PORT).as_str()).await?;

        loop {
            let (stream, peer) = listener.accept().await?;
            let backend = self.clone();
            tokio::spawn(async move {
                if let Err(err) = backend.handle(stream).await {
                    debug!(%peer, %err, "backend link ended");
                }
            });
        }
    }

    async fn handle(self, stream: TcpStream) -> Result<(), BoxError> {
        let mut path = String::new();
        let required = self.require_token.clone();
        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            path = request.uri().path().to_owned();
            if let Some(token) = required {
                let expected = format!("access_token={token}");
                let presented = request
                    .headers()
                    .get("cookie")
                    .and_then(|value| value.to_str().ok())
                    .is_some_and(|cookie| cookie.split("; ").any(|c| c == expected));
                if !presented {
                    let mut denied = ErrorResponse::new(Some("missing credential".into()));
                    *denied.status_mut() = StatusCode::FORBIDDEN;
                    return Err(denied);
                }
            }
            Ok(response)
        };
        let socket = accept_hdr_async(stream, callback).await?;
        let (mut sink, mut incoming) = socket.split();

        if path.starts_with("/ws/transcription/") {
            let processing =
                TranscriptionUpdate { status: TranscriptionStatus::Processing, content: None };
            sink.send(Message::Text(processing.encode()?)).await?;

            let completed = TranscriptionUpdate {
                status: TranscriptionStatus::Completed,
                content: self.transcript.clone(),
            };
            sink.send(Message::Text(completed.encode()?)).await?;

            while let Some(message) = incoming.next().await {
                if message?.is_close() {
                    break;
                }
            }
            return Ok(());
        }

        let mut answered = 0;
        while let Some(message) = incoming.next().await {
            let text = match message? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            for fragment in self.reply(&text) {
                sink.send(Message::Text(fragment.encode()?)).await?;
            }

            answered += 1;
            if self.close_after.is_some_and(|limit| answered >= limit) {
                debug!(answered, "backend dropping link");
                sink.close().await?;
                break;
            }
        }
        Ok(())
    }

    fn reply(&self, text: &str) -> Vec<Fragment> {
        let request = match OutgoingRequest::decode(text) {
            Ok(request) => request,
            Err(_) => {
                return vec![Fragment::error("Invalid message format", Some("invalid_format".into()))];
            },
        };

        if self.fail_on.as_deref() == Some(request.message.as_str()) {
            return vec![
                Fragment::chunk("partial "),
                Fragment::error("Error processing message", Some("stream_error".into())),
            ];
        }

        Self::answer(&request)
            .split_inclusive(' ')
            .map(Fragment::chunk)
            .chain(std::iter::once(Fragment::done()))
            .collect()
    }
}
