//! WebSocket transport over turmoil's simulated TCP.
//!
//! Uses the production WebSocket framing and credential handling; only the
//! byte stream underneath is simulated.

use async_trait::async_trait;
use scribe_client::{
    Transport, TransportError, WebSocketReceiver, WebSocketSender, client_request, split_socket,
};
use tokio_tungstenite::client_async;
use turmoil::net::TcpStream;

/// Client transport for use inside a turmoil simulation.
#[derive(Debug, Clone, Default)]
pub struct SimTransport {
    access_token: Option<String>,
}

impl SimTransport {
    /// Transport without credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Present `token` as the `access_token` cookie.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

#[async_trait]
impl Transport for SimTransport {
    type Sender = WebSocketSender<TcpStream>;
    type Receiver = WebSocketReceiver<TcpStream>;

    async fn connect(&self, url: &str) -> Result<(Self::Sender, Self::Receiver), TransportError> {
        let request = client_request(url, self.access_token.as_deref())?;

        let host = request
            .uri()
            .host()
            .ok_or_else(|| TransportError::Connect(format!("no host in {url}")))?;
        let addr = format!("{host}:{}", request.uri().port_u16().unwrap_or(80));

        let stream = TcpStream::connect(addr.as_str())
            .await
            .map_err(|err| TransportError::Connect(format!("{addr}: {err}")))?;

        let (socket, _response) = client_async(request, stream).await?;
        Ok(split_socket(socket))
    }
}
