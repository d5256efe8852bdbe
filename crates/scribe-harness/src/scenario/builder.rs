//! Declarative session scenarios.
//!
//! Steps are recorded first and replayed against a fresh [`World`] only when
//! the scenario runs, after an oracle has been attached.

use std::time::Duration;

use scribe_core::{Endpoint, SessionConfig};
use scribe_proto::StreamKind;

use crate::scenario::{OracleFn, World};

const DEFAULT_BASE: &str = "ws://backend:8000";

#[derive(Debug, Clone)]
enum Step {
    OpenLink,
    FailLink(String),
    CloseLink(String),
    Receive(String),
    Send(String),
    Advance(Duration),
    Close,
}

/// Scenario builder.
///
/// Script link events and owner calls, then call `.oracle()` to get a
/// [`RunnableScenario`].
pub struct Scenario {
    name: String,
    kind: StreamKind,
    config: SessionConfig,
    steps: Vec<Step>,
}

impl Scenario {
    /// Create a chat scenario with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StreamKind::Chat,
            config: SessionConfig::default(),
            steps: Vec::new(),
        }
    }

    /// Use a different stream.
    pub fn stream(mut self, kind: StreamKind) -> Self {
        self.kind = kind;
        self
    }

    /// Use custom timing and retry budget.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// The current attempt completes its handshake.
    pub fn open_link(mut self) -> Self {
        self.steps.push(Step::OpenLink);
        self
    }

    /// The current attempt fails.
    pub fn fail_link(mut self, reason: impl Into<String>) -> Self {
        self.steps.push(Step::FailLink(reason.into()));
        self
    }

    /// The current link closes abnormally.
    pub fn close_link(mut self, reason: impl Into<String>) -> Self {
        self.steps.push(Step::CloseLink(reason.into()));
        self
    }

    /// The server pushes one text frame.
    pub fn receive(mut self, text: impl Into<String>) -> Self {
        self.steps.push(Step::Receive(text.into()));
        self
    }

    /// The owner sends a message. Rejections are recorded, not fatal.
    pub fn send(mut self, message: impl Into<String>) -> Self {
        self.steps.push(Step::Send(message.into()));
        self
    }

    /// Let virtual time pass.
    pub fn advance(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Advance(duration));
        self
    }

    /// The owner closes the session.
    pub fn close(mut self) -> Self {
        self.steps.push(Step::Close);
        self
    }

    /// Attach the check that judges the final world.
    ///
    /// Only the returned [`RunnableScenario`] has `run`, so every scenario
    /// ends in verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// Scenario with its oracle attached.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute every step, then run the oracle.
    ///
    /// # Errors
    ///
    /// If the endpoint is invalid or the oracle rejects the final world.
    pub fn run(self) -> Result<(), String> {
        let Scenario { name, kind, config, steps } = self.scenario;

        let endpoint = Endpoint::new(DEFAULT_BASE, kind)
            .map_err(|e| format!("Scenario '{name}': invalid endpoint: {e}"))?;
        let mut world = World::new(endpoint, config);

        for step in steps {
            match step {
                Step::OpenLink => world.open_link(),
                Step::FailLink(reason) => world.fail_link(&reason),
                Step::CloseLink(reason) => world.close_link(&reason),
                Step::Receive(text) => world.receive(&text),
                Step::Send(message) => {
                    // Rejections show up in the oracle as missing transmits.
                    let _ = world.send(&message);
                },
                Step::Advance(duration) => world.advance(duration),
                Step::Close => world.close(),
            }
        }

        (self.oracle)(&world).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}
