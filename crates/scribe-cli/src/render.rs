//! Line-oriented rendering of [`App`] state.
//!
//! The renderer remembers what it already printed and writes only the
//! difference, so streamed answers appear chunk by chunk on one line.

use std::io::{self, Write};

use scribe_app::{App, Author};
use scribe_core::SessionState;

/// Incremental writer for app state.
#[derive(Debug)]
pub struct Renderer<W: Write> {
    out: W,
    status: Option<SessionState>,
    error: Option<String>,
    /// Index of the message being printed.
    message: usize,
    /// Bytes of that message already printed.
    offset: usize,
    /// Prefix of that message already printed.
    open: bool,
}

impl<W: Write> Renderer<W> {
    /// Render into `out`.
    pub fn new(out: W) -> Self {
        Self { out, status: None, error: None, message: 0, offset: 0, open: false }
    }

    /// Consume the renderer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print whatever changed since the last call.
    ///
    /// # Errors
    ///
    /// If writing to the output fails.
    pub fn render(&mut self, app: &App) -> io::Result<()> {
        if self.status != Some(app.status()) {
            self.status = Some(app.status());
            self.finish_line()?;
            writeln!(self.out, "[{}]", status_label(app.status()))?;
        }

        if app.messages().len() < self.message {
            // Conversation was cleared.
            self.message = 0;
            self.offset = 0;
            self.open = false;
        }

        while let Some(message) = app.messages().get(self.message) {
            if message.author == Author::User {
                self.message += 1;
                continue;
            }

            if !self.open {
                write!(self.out, "scribe> ")?;
                self.open = true;
            }
            let tail = message.content.get(self.offset..).unwrap_or_default();
            write!(self.out, "{tail}")?;
            self.offset = message.content.len();

            if message.streaming {
                break;
            }
            writeln!(self.out)?;
            self.message += 1;
            self.offset = 0;
            self.open = false;
        }

        if self.error.as_deref() != app.error() {
            self.error = app.error().map(str::to_owned);
            if let Some(error) = app.error() {
                self.finish_line()?;
                writeln!(self.out, "! {error}")?;
            }
        }

        self.out.flush()
    }

    /// Print the whole conversation.
    ///
    /// # Errors
    ///
    /// If writing to the output fails.
    pub fn history(&mut self, app: &App) -> io::Result<()> {
        self.finish_line()?;
        if app.messages().is_empty() {
            writeln!(self.out, "(no messages)")?;
        }
        for message in app.messages() {
            let who = match message.author {
                Author::User => "you",
                Author::Assistant => "scribe",
            };
            writeln!(self.out, "{who}> {}", message.content)?;
        }
        self.out.flush()
    }

    /// Break a half-printed streaming line before writing anything else.
    fn finish_line(&mut self) -> io::Result<()> {
        if self.open {
            writeln!(self.out)?;
            self.open = false;
        }
        Ok(())
    }
}

fn status_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Connecting => "connecting...",
        SessionState::Reconnecting => "reconnecting...",
        SessionState::Open => "connected",
        SessionState::Failed => "disconnected",
        SessionState::Closed => "closed",
    }
}
