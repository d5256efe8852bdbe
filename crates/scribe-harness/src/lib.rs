//! Deterministic test harness for Scribe sessions.
//!
//! - [`ScriptedTransport`]: in-memory transport whose handshakes and server
//!   behaviour the test controls, for paused-clock runtime tests
//! - [`SimTransport`] / [`SimBackend`]: WebSocket client and backend over
//!   turmoil's simulated TCP, for end-to-end fault tests
//! - [`scenario`]: sans-IO scenarios with a mandatory oracle
//! - [`model`]: reference model for model-based property tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod scenario;
pub mod scripted;
pub mod sim_backend;
pub mod sim_transport;

pub use model::{ModelSession, Operation};
pub use scripted::{ConnectOutcome, ScriptedTransport, ServerEnd};
pub use sim_backend::SimBackend;
pub use sim_transport::SimTransport;
