//! Terminal client for Scribe
//!
//! A thin line-oriented shell over [`scribe_app::App`]: stdin lines and
//! session events go in, rendered conversation text comes out on stdout.
//! Logs go to stderr.

pub mod args;
pub mod render;
pub mod runtime;

use std::io;

use scribe_core::EndpointError;
use thiserror::Error;

pub use args::Args;
pub use render::Renderer;
pub use runtime::{Flow, Terminal, run};

/// Errors that end the terminal client.
#[derive(Debug, Error)]
pub enum CliError {
    /// Terminal I/O failed.
    #[error("terminal I/O: {0}")]
    Io(#[from] io::Error),

    /// Backend URL is unusable.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}
