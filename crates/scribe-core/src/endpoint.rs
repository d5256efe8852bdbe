//! Socket endpoints.

use std::fmt;

use scribe_proto::StreamKind;
use thiserror::Error;

/// Reasons a base URL is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// Base URL does not use `ws://` or `wss://`.
    #[error("unsupported scheme in {url:?}: expected ws:// or wss://")]
    UnsupportedScheme {
        /// The rejected URL.
        url: String,
    },

    /// Base URL has a scheme but no host.
    #[error("missing host in {url:?}")]
    MissingHost {
        /// The rejected URL.
        url: String,
    },
}

/// A validated socket address: configured base plus the stream's fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: String,
    kind: StreamKind,
}

impl Endpoint {
    /// Build an endpoint from a base URL such as `wss://api.example.org`.
    ///
    /// Trailing slashes on the base are dropped so the path suffix is joined
    /// exactly once.
    pub fn new(base: impl AsRef<str>, kind: StreamKind) -> Result<Self, EndpointError> {
        let base = base.as_ref().trim().trim_end_matches('/');

        let rest = base
            .strip_prefix("wss://")
            .or_else(|| base.strip_prefix("ws://"))
            .ok_or_else(|| EndpointError::UnsupportedScheme { url: base.to_string() })?;

        if rest.is_empty() || rest.starts_with('/') {
            return Err(EndpointError::MissingHost { url: base.to_string() });
        }

        Ok(Self { base: base.to_string(), kind })
    }

    /// Full socket URL.
    pub fn url(&self) -> String {
        format!("{}{}", self.base, self.kind.path())
    }

    /// Configured base URL without the path suffix.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Stream this endpoint serves.
    pub fn kind(&self) -> &StreamKind {
        &self.kind
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
