//! Session configuration.

use std::time::Duration;

/// Timeouts and retry budget for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time allowed for a link to complete its handshake. A value too large
    /// to schedule disables the timeout.
    pub connect_timeout: Duration,
    /// Constant wait between a failure and the next connect attempt.
    pub reconnect_delay: Duration,
    /// Consecutive losses without a successful open after which the session
    /// fails for good. Reset by every successful open; `0` behaves like `1`.
    pub max_reconnect_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_attempts: 3,
        }
    }
}
