//! WebSocket transport (tokio-tungstenite).
//!
//! The halves are generic over the byte stream so the same framing runs over
//! a real TCP/TLS socket and over a simulated one.

use std::fmt;

use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderValue, header::COOKIE},
    },
};
use tracing::debug;

use crate::{Transport, TransportError, TransportReceiver, TransportSender};

/// Production transport: one WebSocket per link.
///
/// An access token, if set, is presented as the `access_token` cookie on the
/// handshake. Nothing else about authentication is handled here.
#[derive(Clone, Default)]
pub struct WebSocketTransport {
    access_token: Option<String>,
}

impl WebSocketTransport {
    /// Transport without credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Present `token` on every handshake.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

impl fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    type Sender = WebSocketSender<MaybeTlsStream<TcpStream>>;
    type Receiver = WebSocketReceiver<MaybeTlsStream<TcpStream>>;

    async fn connect(&self, url: &str) -> Result<(Self::Sender, Self::Receiver), TransportError> {
        let request = client_request(url, self.access_token.as_deref())?;
        let (socket, response) = connect_async(request).await?;
        debug!(url, status = %response.status(), "websocket handshake complete");
        Ok(split_socket(socket))
    }
}

/// Build the handshake request for `url`, attaching the credential cookie.
///
/// # Errors
///
/// `Connect` if the URL or token cannot form a valid request.
pub fn client_request(url: &str, access_token: Option<&str>) -> Result<Request, TransportError> {
    let mut request = url.into_client_request()?;
    if let Some(token) = access_token {
        let cookie = HeaderValue::from_str(&format!("access_token={token}"))
            .map_err(|err| TransportError::Connect(format!("invalid access token: {err}")))?;
        request.headers_mut().insert(COOKIE, cookie);
    }
    Ok(request)
}

/// Split an established socket into link halves.
pub fn split_socket<S>(socket: WebSocketStream<S>) -> (WebSocketSender<S>, WebSocketReceiver<S>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = socket.split();
    (WebSocketSender { sink }, WebSocketReceiver { stream })
}

/// Write half of a WebSocket link.
pub struct WebSocketSender<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
}

/// Read half of a WebSocket link.
pub struct WebSocketReceiver<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> TransportSender for WebSocketSender<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(err) = self.sink.close().await {
            debug!(%err, "websocket close");
        }
    }
}

#[async_trait]
impl<S> TransportReceiver for WebSocketReceiver<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(message) = self.stream.next().await {
            match message? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Close(frame) => {
                    debug!(?frame, "websocket closed by peer");
                    return Ok(None);
                },
                // Control frames are answered by tungstenite; binary frames
                // are not part of the protocol.
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {},
            }
        }
        Ok(None)
    }
}
