//! Command-line arguments.

use std::time::Duration;

use clap::Parser;
use scribe_client::WebSocketTransport;
use scribe_core::{Endpoint, EndpointError, SessionConfig};
use scribe_proto::StreamKind;

/// Chat with the Scribe assistant, or watch an encounter's transcription.
#[derive(Parser, Debug, Clone)]
#[command(name = "scribe", version, about, long_about = None)]
pub struct Args {
    /// WebSocket base URL of the backend (ws:// or wss://)
    #[arg(long, env = "SCRIBE_WS_URL", default_value = "ws://localhost:8000")]
    pub url: String,

    /// Access token, sent as the `access_token` cookie
    #[arg(long, env = "SCRIBE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Watch the transcription feed of this encounter instead of chatting
    #[arg(long, value_name = "ID")]
    pub encounter: Option<u64>,

    /// Handshake timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub connect_timeout: u64,

    /// Delay between reconnect attempts in seconds
    #[arg(long, default_value_t = 3)]
    pub reconnect_delay: u64,

    /// Reconnect attempts before giving up
    #[arg(long, default_value_t = 3)]
    pub max_reconnect_attempts: u32,
}

impl Args {
    /// Stream selected by the arguments.
    pub fn kind(&self) -> StreamKind {
        match self.encounter {
            Some(encounter_id) => StreamKind::Transcription { encounter_id },
            None => StreamKind::Chat,
        }
    }

    /// Validated endpoint.
    ///
    /// # Errors
    ///
    /// If `url` is not a ws:// or wss:// URL with a host.
    pub fn endpoint(&self) -> Result<Endpoint, EndpointError> {
        Endpoint::new(&self.url, self.kind())
    }

    /// Session timing and retry budget.
    pub fn config(&self) -> SessionConfig {
        SessionConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout),
            reconnect_delay: Duration::from_secs(self.reconnect_delay),
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }

    /// WebSocket transport carrying the credential, if any.
    pub fn transport(&self) -> WebSocketTransport {
        let transport = WebSocketTransport::new();
        match &self.access_token {
            Some(token) => transport.with_access_token(token.clone()),
            None => transport,
        }
    }
}
